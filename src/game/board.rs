//! Board representation
//!
//! Wire encoding matches the contract's `uint8[9]`: `0` empty, `1` X (the
//! game creator), `2` O.

use crate::{Error, Result};
use serde::{Serialize, Serializer};
use std::fmt;

pub const CELLS: usize = 9;

pub const CENTER: u8 = 4;
pub const CORNERS: [u8; 4] = [0, 2, 6, 8];
pub const EDGES: [u8; 4] = [1, 3, 5, 7];

/// Rows, columns and diagonals
pub const WIN_LINES: [[u8; 3]; 8] = [
    [0, 1, 2],
    [3, 4, 5],
    [6, 7, 8],
    [0, 3, 6],
    [1, 4, 7],
    [2, 5, 8],
    [0, 4, 8],
    [2, 4, 6],
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Mark {
    X,
    O,
}

impl Mark {
    pub fn opponent(self) -> Mark {
        match self {
            Mark::X => Mark::O,
            Mark::O => Mark::X,
        }
    }

    pub fn to_wire(self) -> u8 {
        match self {
            Mark::X => 1,
            Mark::O => 2,
        }
    }

    pub fn from_wire(value: u8) -> Option<Mark> {
        match value {
            1 => Some(Mark::X),
            2 => Some(Mark::O),
            _ => None,
        }
    }
}

impl fmt::Display for Mark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mark::X => f.write_str("X"),
            Mark::O => f.write_str("O"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Board([Option<Mark>; CELLS]);

impl Board {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Decode the contract's board encoding
    pub fn from_wire(cells: &[u8]) -> Result<Self> {
        if cells.len() != CELLS {
            return Err(Error::InvalidArgument(format!(
                "board must have {} cells, got {}",
                CELLS,
                cells.len()
            )));
        }

        let mut board = [None; CELLS];
        for (i, &value) in cells.iter().enumerate() {
            board[i] = match value {
                0 => None,
                other => Some(Mark::from_wire(other).ok_or_else(|| {
                    Error::InvalidArgument(format!("cell {} has invalid value {}", i, other))
                })?),
            };
        }
        Ok(Self(board))
    }

    pub fn to_wire(&self) -> [u8; CELLS] {
        self.0.map(|cell| cell.map_or(0, Mark::to_wire))
    }

    pub fn get(&self, cell: u8) -> Option<Mark> {
        self.0.get(cell as usize).copied().flatten()
    }

    /// Place a mark; fails if the cell is out of range or taken
    pub fn place(&mut self, cell: u8, mark: Mark) -> Result<()> {
        self.check_playable(cell)?;
        self.0[cell as usize] = Some(mark);
        Ok(())
    }

    pub fn check_playable(&self, cell: u8) -> Result<()> {
        if cell as usize >= CELLS {
            return Err(Error::InvalidMove(format!(
                "cell {} is off the board (0-8)",
                cell
            )));
        }
        if self.0[cell as usize].is_some() {
            return Err(Error::InvalidMove(format!("cell {} is already taken", cell)));
        }
        Ok(())
    }

    pub fn is_empty_cell(&self, cell: u8) -> bool {
        (cell as usize) < CELLS && self.0[cell as usize].is_none()
    }

    pub fn available(&self) -> impl Iterator<Item = u8> + '_ {
        (0..CELLS as u8).filter(|&i| self.is_empty_cell(i))
    }

    pub fn is_full(&self) -> bool {
        self.0.iter().all(Option::is_some)
    }

    /// The mark holding a complete line, if any
    pub fn winner(&self) -> Option<Mark> {
        WIN_LINES.iter().find_map(|line| {
            let [a, b, c] = line.map(|i| self.get(i));
            match (a, b, c) {
                (Some(a), Some(b), Some(c)) if a == b && b == c => Some(a),
                _ => None,
            }
        })
    }

    /// False once no line can still be completed by either side
    ///
    /// A full board is never winnable. Otherwise a line stays open while it
    /// holds at most one distinct mark.
    pub fn can_still_win(&self) -> bool {
        if self.is_full() {
            return false;
        }

        WIN_LINES.iter().any(|line| {
            let mut seen: Option<Mark> = None;
            line.iter().all(|&i| match (self.get(i), seen) {
                (None, _) => true,
                (Some(m), None) => {
                    seen = Some(m);
                    true
                }
                (Some(m), Some(s)) => m == s,
            })
        })
    }
}

impl Serialize for Board {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_wire().serialize(serializer)
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in 0..3u8 {
            let cells: Vec<String> = (0..3u8)
                .map(|col| {
                    let i = row * 3 + col;
                    self.get(i).map_or_else(|| i.to_string(), |m| m.to_string())
                })
                .collect();
            writeln!(f, " {} ", cells.join(" | "))?;
            if row < 2 {
                writeln!(f, "---+---+---")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_round_trip() {
        let wire = [1, 2, 0, 0, 1, 0, 2, 0, 0];
        assert_eq!(Board::from_wire(&wire).unwrap().to_wire(), wire);
    }

    #[test]
    fn test_rejects_bad_wire() {
        assert!(Board::from_wire(&[0; 8]).is_err());
        assert!(Board::from_wire(&[0, 0, 0, 0, 3, 0, 0, 0, 0]).is_err());
    }

    #[test]
    fn test_winner_lines() {
        let row = Board::from_wire(&[1, 1, 1, 2, 2, 0, 0, 0, 0]).unwrap();
        assert_eq!(row.winner(), Some(Mark::X));

        let diag = Board::from_wire(&[1, 1, 2, 0, 2, 0, 2, 0, 1]).unwrap();
        assert_eq!(diag.winner(), Some(Mark::O));

        assert_eq!(Board::empty().winner(), None);
    }

    #[test]
    fn test_full_board_cannot_be_won() {
        let board = Board::from_wire(&[1, 2, 1, 2, 1, 2, 2, 1, 2]).unwrap();
        assert!(!board.can_still_win());
    }

    #[test]
    fn test_blocked_lines_cannot_be_won() {
        // Every line already holds both marks
        let board = Board::from_wire(&[1, 2, 1, 1, 2, 2, 2, 1, 0]).unwrap();
        assert!(!board.can_still_win());
    }

    #[test]
    fn test_open_line_can_be_won() {
        assert!(Board::empty().can_still_win());
        let board = Board::from_wire(&[1, 2, 1, 0, 0, 0, 0, 0, 0]).unwrap();
        assert!(board.can_still_win());
    }

    #[test]
    fn test_place_validates_cell() {
        let mut board = Board::empty();
        board.place(4, Mark::X).unwrap();
        assert!(matches!(board.place(4, Mark::O), Err(Error::InvalidMove(_))));
        assert!(matches!(board.place(9, Mark::O), Err(Error::InvalidMove(_))));
        assert_eq!(board.available().count(), 8);
    }

    #[test]
    fn test_display_grid() {
        let board = Board::from_wire(&[1, 0, 0, 0, 2, 0, 0, 0, 0]).unwrap();
        let rendered = board.to_string();
        assert!(rendered.starts_with(" X | 1 | 2 \n"));
        assert!(rendered.contains(" 3 | O | 5 "));
    }
}
