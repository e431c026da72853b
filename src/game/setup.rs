use crate::types::Role;
use rand::seq::SliceRandom;
use rand::Rng;

/// Safe character set for session codes (excludes 0/O, 1/I/L to avoid confusion)
const CODE_CHARS: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";
pub const CODE_LENGTH: usize = 6;

/// Generate a random session code
pub fn generate_session_code<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..CODE_LENGTH)
        .map(|_| CODE_CHARS[rng.random_range(0..CODE_CHARS.len())] as char)
        .collect()
}

/// Canonical form of a user-typed code
pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

/// Whether `code` could have come from `generate_session_code`
pub fn is_valid_code(code: &str) -> bool {
    code.len() == CODE_LENGTH && code.bytes().all(|b| CODE_CHARS.contains(&b))
}

/// Number of Mafia for a table of the given size
pub fn mafia_count(players: usize) -> usize {
    match players {
        0..=5 => 1,
        6..=10 => 2,
        _ => 3,
    }
}

/// Build the shuffled role deck for a table, one role per seat
pub fn deal_roles<R: Rng + ?Sized>(players: usize, rng: &mut R) -> Vec<Role> {
    let mut deck = vec![Role::Mafia; mafia_count(players).min(players)];
    if players >= 5 {
        deck.push(Role::Doctor);
        deck.push(Role::Detective);
    }
    deck.resize(players, Role::Citizen);
    deck.shuffle(rng);
    deck
}
