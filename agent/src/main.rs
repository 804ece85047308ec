use minesweeper_agent::*;
use std::collections::HashMap;
use std::thread;
use std::time::Duration;

const HEIGHT: usize = 8;
const WIDTH: usize = 8;
const NUM_MINES: usize = 8;

enum Outcome {
    Won,
    Lost,
    Stalled,
}

fn main() {
    // --- 1. Initialization ---
    let mut rng = rand::rng();
    let mut board = Board::new(HEIGHT, WIDTH, NUM_MINES, &mut rng);
    let mut agent = Agent::new(HEIGHT, WIDTH);
    let mut revealed: HashMap<Cell, usize> = HashMap::new();

    println!("--- Autonomous Minesweeper Bot ---");
    println!("Strategy: Prioritize proven-safe moves, guess randomly otherwise.");
    println!("{}x{} board with {} hidden mines.", HEIGHT, WIDTH, NUM_MINES);
    println!("Initial Board:");
    print_board(&agent, &revealed);
    thread::sleep(Duration::from_secs(1));

    // --- 2. Game Loop ---
    let mut move_count = 0;
    let result = loop {
        move_count += 1;
        println!("\n--- Move #{} ---", move_count);

        // --- 3. Bot's Decision Logic ---

        // Strategy 1: a cell the knowledge engine has proven safe.
        let cell = if let Some(cell) = agent.safe_move() {
            println!("Logic found a guaranteed safe cell.");
            cell
        } else if let Some(cell) = agent.random_move(&mut rng) {
            // Strategy 2: no safe move is known, so make a random guess.
            println!("No proven-safe move available. Making a random guess...");
            cell
        } else {
            // Every cell is either played or a proven mine.
            println!("No valid moves left for the bot to make.");
            break Outcome::Stalled;
        };

        // --- 4. Execute the Chosen Move ---
        println!("Bot reveals ({}, {})...", cell.row, cell.col);
        if board.is_mine(cell) {
            break Outcome::Lost;
        }

        let count = board.nearby_mines(cell);
        revealed.insert(cell, count);
        agent.add_observation(cell, count).unwrap();

        // Flag everything the engine has proven so far.
        for &mine in agent.known_mines() {
            board.flag_mine(mine);
        }

        print_board(&agent, &revealed);

        if board.won() {
            break Outcome::Won;
        }

        // Pause so the game is watchable.
        thread::sleep(Duration::from_millis(300));
    };

    // --- 5. Final Result ---
    println!("\n--- Game Over ---");

    match result {
        Outcome::Won => println!(
            "Result: The bot flagged all {} mines in {} moves!",
            board.num_mines(),
            move_count
        ),
        Outcome::Lost => println!("Result: The bot hit a mine and lost."),
        Outcome::Stalled => println!(
            "Result: Out of moves with {} of {} mines proven.",
            agent.known_mines().len(),
            board.num_mines()
        ),
    }
}

fn print_board(agent: &Agent, revealed: &HashMap<Cell, usize>) {
    // Print header
    print!("   ");
    for col in 0..WIDTH {
        print!("{:^3}", col);
    }
    println!("\n  +{}", "---".repeat(WIDTH));

    // Print rows
    for row in 0..HEIGHT {
        print!("{:^2}|", row);
        for col in 0..WIDTH {
            let cell = Cell { row, col };
            let display = match revealed.get(&cell) {
                Some(count) => format!(" {} ", count),
                None if agent.known_mines().contains(&cell) => " F ".to_string(),
                None => " ■ ".to_string(),
            };
            print!("{}", display);
        }
        println!();
    }
    println!();
}
