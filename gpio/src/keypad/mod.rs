//! Matrix keypad decoding and the SX1509-backed keypad driver.
//!
//! See [Sx1509Keypad] for the driver, and [decode] for how the key data registers are turned into
//! a [KeypadKey].

mod sx1509;

pub use sx1509::*;

/// Represents the keys on a 4x3 keypad.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum KeypadKey {
    /// The `1` key.
    Key1,
    /// The `2` key.
    Key2,
    /// The `3` key.
    Key3,
    /// The `4` key.
    Key4,
    /// The `5` key.
    Key5,
    /// The `6` key.
    Key6,
    /// The `7` key.
    Key7,
    /// The `8` key.
    Key8,
    /// The `9` key.
    Key9,
    /// The `0` key.
    Key0,
    /// The `*` key.
    KeyAsterisk,
    /// The `#` key.
    KeyHash,
}

impl KeypadKey {
    pub const ROWS: u8 = 4;
    pub const COLUMNS: u8 = 3;

    /// Converts a position tuple (row, column) to a [KeypadKey].
    pub fn from_position(pos: (u8, u8)) -> Option<KeypadKey> {
        use KeypadKey::*;

        const KEYS: [[KeypadKey; 3]; 4] = [
            [ Key1, Key2, Key3, ],
            [ Key4, Key5, Key6, ],
            [ Key7, Key8, Key9, ],
            [ KeyAsterisk, Key0, KeyHash, ],
        ];

        if pos.0 < Self::ROWS && pos.1 < Self::COLUMNS {
            Some(KEYS[pos.0 as usize][pos.1 as usize])
        } else {
            None
        }
    }

    /// Converts the [KeypadKey] to its corresponding character.
    pub fn to_char(self) -> char {
        use KeypadKey::*;

        match self {
            Key1 => '1',
            Key2 => '2',
            Key3 => '3',
            Key4 => '4',
            Key5 => '5',
            Key6 => '6',
            Key7 => '7',
            Key8 => '8',
            Key9 => '9',
            Key0 => '0',
            KeyAsterisk => '*',
            KeyHash => '#',
        }
    }
}

/// A raw reading of the two key data registers, as read on an interrupt.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct KeyScan {
    /// The column register (`RegKeyData1`), active-low.
    pub column_data: u8,
    /// The row register (`RegKeyData2`), active-low.
    pub row_data: u8,
}

impl KeyScan {
    /// Gets the scan the chip reports for a single key press at `(row, column)`.
    pub fn for_position(row: u8, column: u8) -> Self {
        KeyScan {
            column_data: !(1u8 << column),
            row_data: !(1u8 << row),
        }
    }

    pub fn decode(self) -> Option<KeypadKey> {
        decode(self.column_data, self.row_data)
    }
}

/// Gets the index of the only set bit in `byte`.
///
/// Returns `None` if no bit or more than one bit is set.
fn bit_position(byte: u8) -> Option<u8> {
    (byte.count_ones() == 1).then(|| byte.trailing_zeros() as u8)
}

/// Decodes the active-low key data registers into the pressed key.
///
/// The chip reports exactly one cleared bit in each register for a debounced key press. A
/// register with no cleared bit or several, or a position outside the 4x3 matrix, is not a key
/// press and decodes to `None`.
pub fn decode(column_data: u8, row_data: u8) -> Option<KeypadKey> {
    let column = bit_position(!column_data)?;
    let row = bit_position(!row_data)?;
    KeypadKey::from_position((row, column))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn decodes_every_key_in_the_matrix() {
        let expected = [
            ['1', '2', '3'],
            ['4', '5', '6'],
            ['7', '8', '9'],
            ['*', '0', '#'],
        ];
        for row in 0..KeypadKey::ROWS {
            for column in 0..KeypadKey::COLUMNS {
                let key = KeyScan::for_position(row, column).decode();
                assert_eq!(
                    key.map(KeypadKey::to_char),
                    Some(expected[row as usize][column as usize]),
                    "row {} column {}", row, column,
                );
            }
        }
    }

    #[rstest]
    #[case(0xFF, 0xFE)] // no column bit
    #[case(0xFE, 0xFF)] // no row bit
    #[case(0xFC, 0xFE)] // two columns
    #[case(0xFE, 0xF5)] // two rows
    #[case(0xF7, 0xFE)] // column 3 is outside the matrix
    #[case(0xFE, 0xEF)] // row 4 is outside the matrix
    #[case(0x00, 0x00)]
    fn decode_misses(#[case] column_data: u8, #[case] row_data: u8) {
        assert_eq!(decode(column_data, row_data), None);
    }

    #[rstest]
    #[case(0b0000_0001, Some(0))]
    #[case(0b1000_0000, Some(7))]
    #[case(0b0000_0100, Some(2))]
    #[case(0b0000_0000, None)]
    #[case(0b0001_0100, None)]
    fn single_bit_position(#[case] byte: u8, #[case] expected: Option<u8>) {
        assert_eq!(bit_position(byte), expected);
    }

    #[test]
    fn out_of_range_position_is_not_a_key() {
        assert_eq!(KeypadKey::from_position((4, 0)), None);
        assert_eq!(KeypadKey::from_position((0, 3)), None);
        assert_eq!(KeypadKey::from_position((3, 2)), Some(KeypadKey::KeyHash));
    }
}
