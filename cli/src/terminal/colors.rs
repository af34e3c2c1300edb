use colored::Color;

pub const PRIMARY: Color = Color::BrightGreen;
pub const ACCENT: Color = Color::Cyan;
pub const SEPARATOR: Color = Color::BrightBlack;
pub const TEXT_DEFAULT: Color = Color::White;
pub const ADDRESS: Color = Color::BrightBlue;
pub const MATCH: Color = Color::BrightWhite;
pub const OK: Color = Color::Green;
pub const FAILURE: Color = Color::Red;
pub const WARNING: Color = Color::Yellow;
