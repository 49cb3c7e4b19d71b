use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use crate::error::{BoardError, ParseMoveError};

/// A direction to move/merge tiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Move {
    Up,
    Down,
    Left,
    Right,
}

impl Move {
    /// Enumeration order shared by the search, the policy fallback and the stall-breaker.
    pub const ALL: [Move; 4] = [Move::Up, Move::Right, Move::Down, Move::Left];

    /// Wire token for this direction (`"UP"`, `"DOWN"`, ...).
    pub fn token(self) -> &'static str {
        match self {
            Move::Up => "UP",
            Move::Down => "DOWN",
            Move::Left => "LEFT",
            Move::Right => "RIGHT",
        }
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

impl FromStr for Move {
    type Err = ParseMoveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "UP" => Ok(Move::Up),
            "DOWN" => Ok(Move::Down),
            "LEFT" => Ok(Move::Left),
            "RIGHT" => Ok(Move::Right),
            _ => Err(ParseMoveError(s.to_string())),
        }
    }
}

const LINE_TABLE_SIZE: usize = 0x1_0000; // 65,536 possible 16-bit lines

/// Largest exponent a nibble can hold (2^15 = 32768).
pub const MAX_EXPONENT: u8 = 15;

struct Stores {
    left: Box<[u16]>,
    right: Box<[u16]>,
    left_score: Box<[u32]>,
    right_score: Box<[u32]>,
}

type BoardRaw = u64;
type Line = u16;

/// Packed 4x4 2048 board as 16 4-bit nibbles in a `u64`.
///
/// Each nibble stores the log2 of its tile (0 = empty), row-major, with cell
/// (0, 0) in the most significant nibble. Boards are plain values: every
/// operation returns a fresh `Board`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Board(BoardRaw);

/// Outcome of simulating a single slide-and-merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveResult {
    pub board: Board,
    /// Sum of the values of all tiles created by merges.
    pub score_gained: u64,
    /// True iff `board` differs from the input.
    pub moved: bool,
}

impl Board {
    /// A constant empty board (all zeros).
    pub const EMPTY: Board = Board(0);

    /// Construct a `Board` from its raw packed representation.
    #[inline]
    pub fn from_raw(raw: BoardRaw) -> Self { Board(raw) }

    /// Consume this `Board`, returning the raw packed `u64`.
    #[inline]
    pub fn into_raw(self) -> BoardRaw { self.0 }

    /// Borrow the raw packed `u64` for this `Board`.
    #[inline]
    pub fn raw(&self) -> BoardRaw { self.0 }

    /// Build a board from tile values, validating shape and contents.
    ///
    /// ```
    /// use ai_2048_solver::engine::Board;
    /// let b = Board::from_rows(&[[2u64, 2, 0, 0], [0; 4], [0; 4], [0; 4]]).unwrap();
    /// assert_eq!(b.tile(0, 1), 2);
    /// assert!(Board::from_rows(&[[3u64, 0, 0, 0], [0; 4], [0; 4], [0; 4]]).is_err());
    /// ```
    pub fn from_rows<R: AsRef<[u64]>>(rows: &[R]) -> Result<Self, BoardError> {
        if rows.len() != 4 {
            return Err(BoardError::RowCount(rows.len()));
        }
        let mut raw = 0;
        for (row, cells) in rows.iter().enumerate() {
            let cells = cells.as_ref();
            if cells.len() != 4 {
                return Err(BoardError::RowLength { row, len: cells.len() });
            }
            for (col, &value) in cells.iter().enumerate() {
                let exp = exponent_of(value).ok_or(BoardError::TileValue { row, col, value })?;
                raw |= (exp as u64) << nibble_shift(row * 4 + col);
            }
        }
        Ok(Board(raw))
    }

    /// Tile values as a 4x4 grid.
    pub fn to_grid(self) -> [[u64; 4]; 4] {
        let mut grid = [[0; 4]; 4];
        for (row, cells) in grid.iter_mut().enumerate() {
            for (col, cell) in cells.iter_mut().enumerate() {
                *cell = self.tile(row, col);
            }
        }
        grid
    }

    /// Value of the tile at (`row`, `col`), 0 if empty.
    #[inline]
    pub fn tile(self, row: usize, col: usize) -> u64 {
        exponent_to_value(self.exponent_at(row * 4 + col))
    }

    /// Log2 of the tile at cell index `idx` (row-major), 0 if empty.
    #[inline]
    pub fn exponent_at(self, idx: usize) -> u8 {
        ((self.0 >> nibble_shift(idx)) & 0xf) as u8
    }

    /// Row-major positions of every empty cell.
    pub fn empty_cells(self) -> impl Iterator<Item = (usize, usize)> {
        (0..16).filter(move |&idx| self.exponent_at(idx) == 0).map(|idx| (idx / 4, idx % 4))
    }

    /// Count the number of empty cells on the board.
    #[inline]
    pub fn count_empty(self) -> u32 { 16 - count_non_empty(self) }

    /// Return the highest tile value present on the board (0 when empty).
    #[inline]
    pub fn max_tile(self) -> u64 { exponent_to_value(self.max_exponent()) }

    #[inline]
    pub(crate) fn max_exponent(self) -> u8 {
        (0..16).map(|idx| self.exponent_at(idx)).max().unwrap_or(0)
    }

    /// Return a copy with `value` placed at (`row`, `col`).
    ///
    /// The target cell must be empty and `value` must be 0 or a power of two
    /// between 2 and 32768.
    pub fn with_tile(self, row: usize, col: usize, value: u64) -> Result<Self, BoardError> {
        let exp = exponent_of(value).ok_or(BoardError::TileValue { row, col, value })?;
        if row >= 4 || col >= 4 {
            return Err(BoardError::TileValue { row, col, value });
        }
        let idx = row * 4 + col;
        if self.exponent_at(idx) != 0 {
            return Err(BoardError::Occupied { row, col });
        }
        Ok(self.with_exponent(idx, exp))
    }

    /// Set an empty cell to `exp` without validation. Used on the search hot path.
    #[inline]
    pub(crate) fn with_exponent(self, idx: usize, exp: u8) -> Self {
        debug_assert_eq!(self.exponent_at(idx), 0, "placing onto an occupied cell");
        Board(self.0 | ((exp as u64) << nibble_shift(idx)))
    }

    /// Return the board resulting from sliding/merging tiles in `dir` (no random insert).
    ///
    /// Example
    /// ```
    /// use ai_2048_solver::engine::{Board, Move};
    /// let b = Board::from_rows(&[[2u64, 2, 0, 0], [0; 4], [0; 4], [0; 4]]).unwrap();
    /// assert_eq!(b.shift(Move::Left).tile(0, 0), 4);
    /// ```
    #[inline]
    pub fn shift(self, dir: Move) -> Self { simulate(self, dir).board }

    /// Simulate a move, reporting the new board, the merge score and whether anything changed.
    #[inline]
    pub fn simulate(self, dir: Move) -> MoveResult { simulate(self, dir) }

    /// Insert a random 2 (90%) or 4 (10%) tile into a random empty slot, using the provided RNG.
    ///
    /// A full board is returned unchanged.
    pub fn with_random_tile<R: Rng + ?Sized>(self, rng: &mut R) -> Self {
        let empty = self.count_empty();
        if empty == 0 {
            return self;
        }
        let mut index = rng.gen_range(0..empty);
        let exp = if rng.gen_range(0..10) < 9 { 1 } else { 2 };
        for idx in 0..16 {
            if self.exponent_at(idx) != 0 {
                continue;
            }
            if index == 0 {
                return self.with_exponent(idx, exp);
            }
            index -= 1;
        }
        self
    }

    /// Return true if no legal moves remain.
    ///
    /// ```
    /// use ai_2048_solver::engine::Board;
    /// // Nothing slides on an empty board.
    /// assert!(Board::EMPTY.is_game_over());
    /// ```
    #[inline]
    pub fn is_game_over(self) -> bool {
        Move::ALL.iter().all(|&dir| !simulate(self, dir).moved)
    }

    /// The four rows as packed 16-bit lines, top to bottom.
    #[inline]
    pub(crate) fn rows(self) -> [Line; 4] {
        [0, 1, 2, 3].map(|row| extract_line(self.0, row))
    }

    /// The four columns as packed 16-bit lines, left to right (top cell first).
    #[inline]
    pub(crate) fn cols(self) -> [Line; 4] {
        let t = transpose(self.0);
        [0, 1, 2, 3].map(|col| extract_line(t, col))
    }
}

impl fmt::Debug for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Board({:#018x})", self.0)
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (row, cells) in self.to_grid().iter().enumerate() {
            if row > 0 {
                writeln!(f, "-----------------------------------")?;
            }
            let line: Vec<String> = cells.iter().map(|&v| format_val(v)).collect();
            writeln!(f, "{}", line.join("|"))?;
        }
        Ok(())
    }
}

impl From<BoardRaw> for Board { fn from(v: BoardRaw) -> Self { Board::from_raw(v) } }
impl From<Board> for BoardRaw { fn from(b: Board) -> Self { b.into_raw() } }

impl TryFrom<[[u64; 4]; 4]> for Board {
    type Error = BoardError;

    fn try_from(grid: [[u64; 4]; 4]) -> Result<Self, Self::Error> { Board::from_rows(&grid) }
}

/// Initialize internal tables on first use. Safe to call multiple times.
pub fn new() {
    let _ = stores();
}

/// Slide/merge tiles in the given direction. No randomness.
///
/// Rows are looked up directly; columns are transposed into rows first.
pub fn simulate(board: Board, direction: Move) -> MoveResult {
    let s = stores();
    let (table, scores, transposed) = match direction {
        Move::Left => (&s.left, &s.left_score, false),
        Move::Right => (&s.right, &s.right_score, false),
        Move::Up => (&s.left, &s.left_score, true),
        Move::Down => (&s.right, &s.right_score, true),
    };
    let src = if transposed { transpose(board.0) } else { board.0 };
    let (mut res, mut score_gained) = (0u64, 0u64);
    for line_idx in 0..4 {
        let line = extract_line(src, line_idx) as usize;
        res |= (table[line] as u64) << (48 - 16 * line_idx);
        score_gained += scores[line] as u64;
    }
    let new_board = Board(if transposed { transpose(res) } else { res });
    let moved = new_board != board;
    MoveResult { board: new_board, score_gained: if moved { score_gained } else { 0 }, moved }
}

/// Slide/merge tiles in the given direction, discarding the score.
pub fn shift(board: Board, direction: Move) -> Board { simulate(board, direction).board }

/// True if no move in any direction changes the board.
pub fn is_game_over(board: Board) -> bool { board.is_game_over() }

// Credit to Nneonneo
pub(crate) fn transpose(x: BoardRaw) -> BoardRaw {
    let a1 = x & 0xF0F00F0FF0F00F0F;
    let a2 = x & 0x0000F0F00000F0F0;
    let a3 = x & 0x0F0F00000F0F0000;
    let a = a1 | (a2 << 12) | (a3 >> 12);
    let b1 = a & 0xFF00FF0000FF00FF;
    let b2 = a & 0x00FF00FF00000000;
    let b3 = a & 0x00000000FF00FF00;
    b1 | (b2 >> 24) | (b3 << 24)
}

#[inline]
pub(crate) fn extract_line(board: BoardRaw, line_idx: usize) -> Line {
    ((board >> ((3 - line_idx) * 16)) & 0xffff) as Line
}

/// Unpack a 16-bit line into its four exponents, first cell first.
#[inline]
pub(crate) fn line_exponents(line: Line) -> [u8; 4] {
    [(line >> 12) as u8 & 0xf, (line >> 8) as u8 & 0xf, (line >> 4) as u8 & 0xf, line as u8 & 0xf]
}

#[inline]
fn pack_line(tiles: [u8; 4]) -> Line {
    (tiles[0] as Line) << 12 | (tiles[1] as Line) << 8 | (tiles[2] as Line) << 4 | tiles[3] as Line
}

/// Slide one line of exponents toward index 0.
///
/// Zeros are dropped, then equal neighbours merge pairwise from the front; a
/// merged tile never merges again in the same move. Returns the new line and
/// the summed value of the merged tiles. Two 32768 tiles do not merge since the
/// result would not fit a nibble.
pub(crate) fn merge_line(line: [u8; 4]) -> ([u8; 4], u64) {
    let mut packed = [0u8; 4];
    let mut len = 0;
    for &exp in line.iter().filter(|&&e| e != 0) {
        packed[len] = exp;
        len += 1;
    }
    let mut out = [0u8; 4];
    let mut gained = 0;
    let (mut i, mut k) = (0, 0);
    while i < len {
        if i + 1 < len && packed[i] == packed[i + 1] && packed[i] < MAX_EXPONENT {
            out[k] = packed[i] + 1;
            gained += 1u64 << out[k];
            i += 2;
        } else {
            out[k] = packed[i];
            i += 1;
        }
        k += 1;
    }
    (out, gained)
}

fn merge_line_right(line: [u8; 4]) -> ([u8; 4], u64) {
    let [a, b, c, d] = line;
    let ([w, x, y, z], gained) = merge_line([d, c, b, a]);
    ([z, y, x, w], gained)
}

static STORES: OnceLock<Stores> = OnceLock::new();

fn create_stores() -> Stores {
    // Allocate on the heap to avoid large stack frames
    let mut left = vec![0u16; LINE_TABLE_SIZE];
    let mut right = vec![0u16; LINE_TABLE_SIZE];
    let mut left_score = vec![0u32; LINE_TABLE_SIZE];
    let mut right_score = vec![0u32; LINE_TABLE_SIZE];

    for val in 0..LINE_TABLE_SIZE {
        let tiles = line_exponents(val as Line);
        let (l, ls) = merge_line(tiles);
        let (r, rs) = merge_line_right(tiles);
        left[val] = pack_line(l);
        right[val] = pack_line(r);
        // At most two merges of 2^15 per line, well inside u32.
        left_score[val] = ls as u32;
        right_score[val] = rs as u32;
    }

    Stores {
        left: left.into_boxed_slice(),
        right: right.into_boxed_slice(),
        left_score: left_score.into_boxed_slice(),
        right_score: right_score.into_boxed_slice(),
    }
}

#[inline(always)]
fn stores() -> &'static Stores {
    STORES.get_or_init(create_stores)
}

#[inline]
fn nibble_shift(idx: usize) -> usize { 60 - 4 * idx }

#[inline]
pub(crate) fn exponent_to_value(exp: u8) -> u64 {
    if exp == 0 { 0 } else { 1u64 << exp }
}

/// Log2 of a legal tile value; 0 maps to 0. None for anything else.
pub(crate) fn exponent_of(value: u64) -> Option<u8> {
    match value {
        0 => Some(0),
        v if v.is_power_of_two() && v >= 2 && v.trailing_zeros() <= MAX_EXPONENT as u32 => {
            Some(v.trailing_zeros() as u8)
        }
        _ => None,
    }
}

// https://stackoverflow.com/questions/38225571/count-number-of-zero-nibbles-in-an-unsigned-64-bit-integer
fn count_non_empty(board: Board) -> u32 {
    let mut board_copy = board.0;
    board_copy |= board_copy >> 1;
    board_copy |= board_copy >> 2;
    board_copy &= 0x1111111111111111;
    board_copy.count_ones()
}

fn format_val(val: u64) -> String {
    match val {
        0 => " ".repeat(8),
        v => format!("{:^8}", v),
    }
}
