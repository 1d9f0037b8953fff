//! Key code definitions and the fixed key-name table
//!
//! Key codes are Linux input-event codes (`KEY_*`). The table covers codes
//! 0-127, which holds every key the practice vocabulary needs; anything
//! else goes through the translator's fallback lookup.

use super::Modifier;

/// Represents a physical key code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeyCode(pub u16);

impl KeyCode {
    pub const fn new(code: u16) -> Self {
        Self(code)
    }

    pub fn as_u16(&self) -> u16 {
        self.0
    }
}

impl From<u16> for KeyCode {
    fn from(code: u16) -> Self {
        Self(code)
    }
}

pub const KEY_ESC: KeyCode = KeyCode(1);
pub const KEY_MINUS: KeyCode = KeyCode(12);
pub const KEY_LEFTCTRL: KeyCode = KeyCode(29);
pub const KEY_GRAVE: KeyCode = KeyCode(41);
pub const KEY_LEFTSHIFT: KeyCode = KeyCode(42);
pub const KEY_RIGHTSHIFT: KeyCode = KeyCode(54);
pub const KEY_LEFTALT: KeyCode = KeyCode(56);
pub const KEY_CAPSLOCK: KeyCode = KeyCode(58);
pub const KEY_RIGHTCTRL: KeyCode = KeyCode(97);
pub const KEY_RIGHTALT: KeyCode = KeyCode(100);
pub const KEY_HOME: KeyCode = KeyCode(102);
pub const KEY_UP: KeyCode = KeyCode(103);
pub const KEY_PAGEUP: KeyCode = KeyCode(104);
pub const KEY_LEFT: KeyCode = KeyCode(105);
pub const KEY_RIGHT: KeyCode = KeyCode(106);
pub const KEY_END: KeyCode = KeyCode(107);
pub const KEY_DOWN: KeyCode = KeyCode(108);
pub const KEY_PAGEDOWN: KeyCode = KeyCode(109);
pub const KEY_LEFTMETA: KeyCode = KeyCode(125);
pub const KEY_RIGHTMETA: KeyCode = KeyCode(126);
pub const KEY_FN: KeyCode = KeyCode(464);

/// Number of entries in [`TOKEN_TABLE`]
pub const TABLE_SIZE: usize = 128;

/// Static key-name table indexed by key code
pub static TOKEN_TABLE: [Option<&str>; TABLE_SIZE] = build_token_table();

const fn build_token_table() -> [Option<&'static str>; TABLE_SIZE] {
    let mut t: [Option<&'static str>; TABLE_SIZE] = [None; TABLE_SIZE];

    t[1] = Some("escape");

    // Number row
    t[2] = Some("1");
    t[3] = Some("2");
    t[4] = Some("3");
    t[5] = Some("4");
    t[6] = Some("5");
    t[7] = Some("6");
    t[8] = Some("7");
    t[9] = Some("8");
    t[10] = Some("9");
    t[11] = Some("0");
    t[12] = Some("-");
    t[13] = Some("=");
    t[14] = Some("delete");

    // Top letter row
    t[15] = Some("tab");
    t[16] = Some("q");
    t[17] = Some("w");
    t[18] = Some("e");
    t[19] = Some("r");
    t[20] = Some("t");
    t[21] = Some("y");
    t[22] = Some("u");
    t[23] = Some("i");
    t[24] = Some("o");
    t[25] = Some("p");
    t[26] = Some("[");
    t[27] = Some("]");
    t[28] = Some("return");

    // Home row
    t[29] = Some("ctrl");
    t[30] = Some("a");
    t[31] = Some("s");
    t[32] = Some("d");
    t[33] = Some("f");
    t[34] = Some("g");
    t[35] = Some("h");
    t[36] = Some("j");
    t[37] = Some("k");
    t[38] = Some("l");
    t[39] = Some(";");
    t[40] = Some("'");
    t[41] = Some("`");

    // Bottom letter row
    t[42] = Some("shift");
    t[43] = Some("\\");
    t[44] = Some("z");
    t[45] = Some("x");
    t[46] = Some("c");
    t[47] = Some("v");
    t[48] = Some("b");
    t[49] = Some("n");
    t[50] = Some("m");
    t[51] = Some(",");
    t[52] = Some(".");
    t[53] = Some("/");
    t[54] = Some("shift");

    t[56] = Some("alt");
    t[57] = Some("space");
    t[58] = Some("capslock");

    // Function row
    t[59] = Some("f1");
    t[60] = Some("f2");
    t[61] = Some("f3");
    t[62] = Some("f4");
    t[63] = Some("f5");
    t[64] = Some("f6");
    t[65] = Some("f7");
    t[66] = Some("f8");
    t[67] = Some("f9");
    t[68] = Some("f10");
    t[87] = Some("f11");
    t[88] = Some("f12");

    t[97] = Some("ctrl");
    t[100] = Some("alt");

    // Navigation cluster
    t[102] = Some("home");
    t[103] = Some("up");
    t[104] = Some("pageup");
    t[105] = Some("left");
    t[106] = Some("right");
    t[107] = Some("end");
    t[108] = Some("down");
    t[109] = Some("pagedown");
    t[110] = Some("insert");
    t[111] = Some("forwarddelete");

    t[125] = Some("cmd");
    t[126] = Some("cmd");

    t
}

/// Look up the canonical name for a key code in the fixed table
pub fn key_name(code: KeyCode) -> Option<&'static str> {
    TOKEN_TABLE.get(code.0 as usize).copied().flatten()
}

/// Reverse lookup: first key code whose table name equals `name`
pub fn code_for_name(name: &str) -> Option<KeyCode> {
    if name == "fn" {
        return Some(KEY_FN);
    }
    TOKEN_TABLE
        .iter()
        .position(|entry| *entry == Some(name))
        .map(|idx| KeyCode(idx as u16))
}

/// The modifier a key code drives, if it is a modifier key
pub fn modifier_for_key(code: KeyCode) -> Option<Modifier> {
    match code {
        KEY_LEFTCTRL | KEY_RIGHTCTRL => Some(Modifier::Ctrl),
        KEY_LEFTALT | KEY_RIGHTALT => Some(Modifier::Alt),
        KEY_LEFTSHIFT | KEY_RIGHTSHIFT => Some(Modifier::Shift),
        KEY_LEFTMETA | KEY_RIGHTMETA => Some(Modifier::Cmd),
        KEY_CAPSLOCK => Some(Modifier::CapsLock),
        KEY_FN => Some(Modifier::Fn),
        _ => None,
    }
}

pub fn is_arrow(code: KeyCode) -> bool {
    matches!(code, KEY_UP | KEY_DOWN | KEY_LEFT | KEY_RIGHT)
}

/// Arrow key that a page-navigation key stands in for on keyboards
/// that reach page navigation through `fn` + arrow
pub fn page_nav_arrow(code: KeyCode) -> Option<KeyCode> {
    match code {
        KEY_PAGEUP => Some(KEY_UP),
        KEY_PAGEDOWN => Some(KEY_DOWN),
        KEY_HOME => Some(KEY_LEFT),
        KEY_END => Some(KEY_RIGHT),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn letters_digits_and_punctuation_present() {
        assert_eq!(key_name(KeyCode(30)), Some("a"));
        assert_eq!(key_name(KeyCode(11)), Some("0"));
        assert_eq!(key_name(KEY_MINUS), Some("-"));
        assert_eq!(key_name(KEY_GRAVE), Some("`"));
        assert_eq!(key_name(KeyCode(43)), Some("\\"));
        assert_eq!(key_name(KeyCode(88)), Some("f12"));
    }

    #[test]
    fn out_of_table_codes_have_no_name() {
        assert_eq!(key_name(KeyCode(0)), None);
        assert_eq!(key_name(KeyCode(71)), None); // KP7
        assert_eq!(key_name(KeyCode(200)), None);
        assert_eq!(key_name(KEY_FN), None);
    }

    #[test]
    fn reverse_lookup_resolves_first_entry() {
        assert_eq!(code_for_name("-"), Some(KEY_MINUS));
        assert_eq!(code_for_name("shift"), Some(KEY_LEFTSHIFT));
        assert_eq!(code_for_name("cmd"), Some(KEY_LEFTMETA));
        assert_eq!(code_for_name("fn"), Some(KEY_FN));
        assert_eq!(code_for_name("nope"), None);
    }

    #[test]
    fn every_named_entry_round_trips_through_reverse_lookup() {
        for (idx, entry) in TOKEN_TABLE.iter().enumerate() {
            if let Some(name) = entry {
                let code = code_for_name(name).expect("name resolves");
                assert_eq!(key_name(code), Some(*name), "code {}", idx);
            }
        }
    }

    #[test]
    fn modifier_keys_both_sides() {
        assert_eq!(modifier_for_key(KEY_LEFTSHIFT), Some(Modifier::Shift));
        assert_eq!(modifier_for_key(KEY_RIGHTSHIFT), Some(Modifier::Shift));
        assert_eq!(modifier_for_key(KEY_RIGHTMETA), Some(Modifier::Cmd));
        assert_eq!(modifier_for_key(KEY_FN), Some(Modifier::Fn));
        assert_eq!(modifier_for_key(KeyCode(30)), None);
    }

    #[test]
    fn page_navigation_maps_to_arrows() {
        assert_eq!(page_nav_arrow(KEY_PAGEUP), Some(KEY_UP));
        assert_eq!(page_nav_arrow(KEY_PAGEDOWN), Some(KEY_DOWN));
        assert_eq!(page_nav_arrow(KEY_HOME), Some(KEY_LEFT));
        assert_eq!(page_nav_arrow(KEY_END), Some(KEY_RIGHT));
        assert_eq!(page_nav_arrow(KEY_UP), None);
        assert!(is_arrow(KEY_LEFT));
        assert!(!is_arrow(KEY_HOME));
    }
}
