use itertools::Itertools;
use rand::Rng;
use rand::prelude::IndexedRandom;
use std::collections::HashSet;

/// A board coordinate, addressed as (row, column).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Cell {
    pub row: usize,
    pub col: usize,
}

/// The hidden board: mine placement, neighbor counts, flagging, and the win
/// check. A pure state holder: all deduction lives in [`Agent`].
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Board {
    pub height: usize,
    pub width: usize,
    /// Ground truth: `field[row][col]` is true iff that cell holds a mine.
    field: Vec<Vec<bool>>,
    /// Mines the player has flagged so far.
    flagged: HashSet<Cell>,
}

/// A logical statement about the board: exactly `count` of `cells` are
/// mines.
///
/// Sentences only ever shrink. As individual cells are proven to be mines or
/// safe they are removed (with the count decremented for mines), until the
/// sentence either pins every remaining cell or becomes vacuous.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sentence {
    cells: HashSet<Cell>,
    count: usize,
}

/// The autonomous player: accumulates certain knowledge about a hidden board
/// from neighbor-count observations and answers move queries.
///
/// The agent never sees the board itself. The caller reveals a cell on the
/// oracle, feeds the reported count to [`Agent::add_observation`], and asks
/// for the next move with [`Agent::safe_move`] / [`Agent::random_move`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Agent {
    height: usize,
    width: usize,
    /// Every cell the agent has chosen to reveal. Grows monotonically.
    moves_made: HashSet<Cell>,
    /// Cells proven to be mines. Grows monotonically; disjoint from `safes`.
    mines: HashSet<Cell>,
    /// Cells proven to be safe. Grows monotonically; disjoint from `mines`.
    safes: HashSet<Cell>,
    /// The knowledge base. Sentences are owned by value; vacuous ones are
    /// dropped and structural duplicates collapsed after every inference
    /// round.
    knowledge: Vec<Sentence>,
}

// --- Board oracle ---

impl Board {
    /// Places exactly `num_mines` mines uniformly at random.
    pub fn new(height: usize, width: usize, num_mines: usize, rng: &mut impl Rng) -> Self {
        if num_mines >= height * width {
            panic!("Number of mines must be less than the number of cells on the board.");
        }
        let mut field = vec![vec![false; width]; height];
        let mut placed = 0;
        while placed < num_mines {
            let row = rng.random_range(0..height);
            let col = rng.random_range(0..width);
            if !field[row][col] {
                field[row][col] = true;
                placed += 1;
            }
        }
        Board {
            height,
            width,
            field,
            flagged: HashSet::new(),
        }
    }

    /// Deterministic mine placement, for tests and replays.
    pub fn with_mines(height: usize, width: usize, mines: impl IntoIterator<Item = Cell>) -> Self {
        let mut field = vec![vec![false; width]; height];
        for cell in mines {
            if cell.row >= height || cell.col >= width {
                panic!("Mine placed outside the board at {:?}.", cell);
            }
            field[cell.row][cell.col] = true;
        }
        Board {
            height,
            width,
            field,
            flagged: HashSet::new(),
        }
    }

    pub fn is_mine(&self, cell: Cell) -> bool {
        self.field[cell.row][cell.col]
    }

    /// The number of mines within one row and column of `cell`, the cell
    /// itself excluded. Edges and corners see fewer than eight neighbors.
    pub fn nearby_mines(&self, cell: Cell) -> usize {
        neighbors(cell, self.height, self.width)
            .filter(|&neighbor| self.is_mine(neighbor))
            .count()
    }

    /// Records a mine the player claims to have found. Idempotent.
    pub fn flag_mine(&mut self, cell: Cell) {
        self.flagged.insert(cell);
    }

    /// The game is won once the flagged set matches the mine set exactly.
    pub fn won(&self) -> bool {
        (0..self.height)
            .cartesian_product(0..self.width)
            .map(|(row, col)| Cell { row, col })
            .all(|cell| self.is_mine(cell) == self.flagged.contains(&cell))
    }

    pub fn num_mines(&self) -> usize {
        self.field.iter().flatten().filter(|&&mine| mine).count()
    }

    /// Serializes the board state to bytes.
    pub fn serialize(&self) -> Vec<u8> {
        bcs::to_bytes(self).unwrap()
    }

    /// Deserializes a board state from bytes.
    pub fn deserialize(bts: &[u8]) -> Self {
        bcs::from_bytes(bts).unwrap()
    }
}

// --- Sentences ---

impl Sentence {
    pub fn new(cells: impl IntoIterator<Item = Cell>, count: usize) -> Self {
        Sentence {
            cells: cells.into_iter().collect(),
            count,
        }
    }

    pub fn cells(&self) -> &HashSet<Cell> {
        &self.cells
    }

    pub fn count(&self) -> usize {
        self.count
    }

    /// A sentence over no cells carries no further information.
    pub fn is_vacuous(&self) -> bool {
        self.cells.is_empty()
    }

    /// The cells known to be mines: all of them when the count matches the
    /// set size, none otherwise.
    pub fn forced_mines(&self) -> HashSet<Cell> {
        if self.count == self.cells.len() {
            self.cells.clone()
        } else {
            HashSet::new()
        }
    }

    /// The cells known to be safe: all of them when the count is zero, none
    /// otherwise.
    pub fn forced_safes(&self) -> HashSet<Cell> {
        if self.count == 0 {
            self.cells.clone()
        } else {
            HashSet::new()
        }
    }

    /// Removes a cell proven to be a mine, decrementing the mine count.
    /// No-op when the cell is not a member.
    pub fn record_mine(&mut self, cell: Cell) -> anyhow::Result<()> {
        if self.cells.remove(&cell) {
            if self.count == 0 {
                anyhow::bail!("mine_count_underflow");
            }
            self.count -= 1;
        }
        Ok(())
    }

    /// Removes a cell proven to be safe; the mine count is unchanged.
    /// No-op when the cell is not a member.
    pub fn record_safe(&mut self, cell: Cell) -> anyhow::Result<()> {
        if self.cells.remove(&cell) && self.count > self.cells.len() {
            anyhow::bail!("mine_count_overflow");
        }
        Ok(())
    }

    fn is_subset_of(&self, other: &Sentence) -> bool {
        self.cells.is_subset(&other.cells)
    }

    /// The subtraction rule: when `self ⊆ other`, the cells of `other` not
    /// covered by `self` must hold exactly the difference of the two counts.
    fn subtract_from(&self, other: &Sentence) -> anyhow::Result<Sentence> {
        let cells: HashSet<Cell> = other.cells.difference(&self.cells).copied().collect();
        let Some(count) = other.count.checked_sub(self.count) else {
            anyhow::bail!("mine_count_underflow");
        };
        if count > cells.len() {
            anyhow::bail!("mine_count_overflow");
        }
        Ok(Sentence { cells, count })
    }
}

// --- Agent (the knowledge engine) ---

impl Agent {
    pub fn new(height: usize, width: usize) -> Self {
        Agent {
            height,
            width,
            moves_made: HashSet::new(),
            mines: HashSet::new(),
            safes: HashSet::new(),
            knowledge: Vec::new(),
        }
    }

    /// Cells proven to be mines so far.
    pub fn known_mines(&self) -> &HashSet<Cell> {
        &self.mines
    }

    /// Cells proven to be safe so far.
    pub fn known_safes(&self) -> &HashSet<Cell> {
        &self.safes
    }

    /// Cells the agent has already chosen to reveal.
    pub fn moves_made(&self) -> &HashSet<Cell> {
        &self.moves_made
    }

    pub fn knowledge(&self) -> &[Sentence] {
        &self.knowledge
    }

    /// Records that a cell is a mine and propagates the fact through every
    /// sentence in the knowledge base. Idempotent; does not re-run
    /// inference (only [`Agent::add_observation`] does).
    pub fn mark_mine(&mut self, cell: Cell) -> anyhow::Result<()> {
        if self.safes.contains(&cell) {
            anyhow::bail!("mine_safe_collision");
        }
        if self.mines.insert(cell) {
            for sentence in &mut self.knowledge {
                sentence.record_mine(cell)?;
            }
        }
        Ok(())
    }

    /// Records that a cell is safe and propagates the fact through every
    /// sentence in the knowledge base. Idempotent; does not re-run
    /// inference.
    pub fn mark_safe(&mut self, cell: Cell) -> anyhow::Result<()> {
        if self.mines.contains(&cell) {
            anyhow::bail!("mine_safe_collision");
        }
        if self.safes.insert(cell) {
            for sentence in &mut self.knowledge {
                sentence.record_safe(cell)?;
            }
        }
        Ok(())
    }

    /// The primary entry point, called once per revealed cell with the
    /// oracle-reported neighbor-mine count.
    ///
    /// This function:
    /// 1. Records the cell as a move that has been made.
    /// 2. Marks the cell itself safe (it was revealed without exploding).
    /// 3. Builds a sentence over the cell's unresolved neighbors. The oracle
    ///    reports the raw count, so neighbors already proven to be mines are
    ///    left out of the sentence and subtracted from the count; neighbors
    ///    already proven safe are simply left out.
    /// 4. Closes the knowledge base under direct and subset resolution.
    ///
    /// Fails when the observation contradicts established knowledge (a
    /// count that cannot fit its cell set, or a cell forced both ways).
    pub fn add_observation(&mut self, cell: Cell, count: usize) -> anyhow::Result<()> {
        self.moves_made.insert(cell);
        self.mark_safe(cell)?;

        let mut cells = HashSet::new();
        let mut known_mine_neighbors = 0;
        for neighbor in neighbors(cell, self.height, self.width) {
            if self.safes.contains(&neighbor) {
                continue;
            }
            if self.mines.contains(&neighbor) {
                known_mine_neighbors += 1;
                continue;
            }
            cells.insert(neighbor);
        }
        let Some(count) = count.checked_sub(known_mine_neighbors) else {
            anyhow::bail!("mine_count_underflow");
        };
        if count > cells.len() {
            anyhow::bail!("mine_count_overflow");
        }
        self.knowledge.push(Sentence { cells, count });

        self.infer()
    }

    /// Closes the knowledge base under two rules, repeated until neither
    /// makes progress:
    ///
    /// - direct resolution: a sentence whose count is zero proves all its
    ///   cells safe; one whose count equals its size proves them all mines.
    /// - subset resolution: for sentences S1 ⊆ S2, the cells S2 − S1 hold
    ///   exactly count(S2) − count(S1) mines.
    ///
    /// Every productive round either marks a previously-unknown cell (there
    /// are finitely many) or appends a structurally-new sentence over a
    /// finite universe, so the loop terminates.
    fn infer(&mut self) -> anyhow::Result<()> {
        loop {
            let mut progress = false;

            // Direct resolution. Collect first: marking shrinks the
            // sentences being scanned.
            let forced_mines: HashSet<Cell> = self
                .knowledge
                .iter()
                .flat_map(Sentence::forced_mines)
                .collect();
            let forced_safes: HashSet<Cell> = self
                .knowledge
                .iter()
                .flat_map(Sentence::forced_safes)
                .collect();
            for cell in forced_mines {
                if !self.mines.contains(&cell) {
                    self.mark_mine(cell)?;
                    progress = true;
                }
            }
            for cell in forced_safes {
                if !self.safes.contains(&cell) {
                    self.mark_safe(cell)?;
                    progress = true;
                }
            }

            // Subset resolution over ordered pairs, batched so the scan
            // never observes its own derivations.
            let mut derived: Vec<Sentence> = Vec::new();
            let indexes = 0..self.knowledge.len();
            for (i, j) in indexes.clone().cartesian_product(indexes) {
                if i == j {
                    continue;
                }
                let (sub, sup) = (&self.knowledge[i], &self.knowledge[j]);
                if sub == sup || !sub.is_subset_of(sup) {
                    continue;
                }
                let candidate = sub.subtract_from(sup)?;
                if candidate.is_vacuous()
                    || self.knowledge.contains(&candidate)
                    || derived.contains(&candidate)
                {
                    continue;
                }
                derived.push(candidate);
            }
            if !derived.is_empty() {
                progress = true;
                self.knowledge.append(&mut derived);
            }

            // Vacuous sentences carry nothing further; duplicates appear
            // when shrinking makes two sentences coincide.
            self.knowledge.retain(|sentence| !sentence.is_vacuous());
            let mut unique: Vec<Sentence> = Vec::with_capacity(self.knowledge.len());
            for sentence in self.knowledge.drain(..) {
                if !unique.contains(&sentence) {
                    unique.push(sentence);
                }
            }
            self.knowledge = unique;

            if !progress {
                return Ok(());
            }
        }
    }

    /// The first cell in row-major order that is proven safe and not yet
    /// played. Pure query; `None` when no proven-safe cell remains.
    pub fn safe_move(&self) -> Option<Cell> {
        (0..self.height)
            .cartesian_product(0..self.width)
            .map(|(row, col)| Cell { row, col })
            .find(|cell| self.safes.contains(cell) && !self.moves_made.contains(cell))
    }

    /// A uniformly random cell that has not been played and is not a proven
    /// mine. The cell may still be an unproven mine; guessing is the
    /// caller's decision. `None` when no such cell remains.
    pub fn random_move(&self, rng: &mut impl Rng) -> Option<Cell> {
        let candidates: Vec<Cell> = (0..self.height)
            .cartesian_product(0..self.width)
            .map(|(row, col)| Cell { row, col })
            .filter(|cell| !self.moves_made.contains(cell) && !self.mines.contains(cell))
            .collect();
        candidates.choose(rng).copied()
    }
}

/// All on-board cells within one row and column of `cell`, the cell itself
/// excluded.
fn neighbors(cell: Cell, height: usize, width: usize) -> impl Iterator<Item = Cell> {
    (-1..=1).flat_map(move |dr: isize| {
        (-1..=1).filter_map(move |dc: isize| {
            if dr == 0 && dc == 0 {
                return None;
            }
            let row = cell.row as isize + dr;
            let col = cell.col as isize + dc;
            if row >= 0 && row < height as isize && col >= 0 && col < width as isize {
                Some(Cell {
                    row: row as usize,
                    col: col as usize,
                })
            } else {
                None
            }
        })
    })
}
