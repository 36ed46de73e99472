//! Lobby code generation
//!
//! Codes are short, human-readable two-word identifiers ("brisk-otter"),
//! normalized to lowercase. Uniqueness is only required among currently
//! live lobbies, so generation retries against the registry until a free
//! code is found; the code space is large relative to concurrent lobby
//! count, so retries are O(1) in practice.

use crate::types::LobbyCode;
use rand::Rng;

const FIRST_WORDS: &[&str] = &[
    "amber", "bold", "brave", "breezy", "bright", "brisk", "calm", "chilly", "clever", "cosy",
    "crisp", "curly", "dapper", "dusty", "eager", "early", "fancy", "fast", "fierce", "fluffy",
    "fuzzy", "gentle", "giddy", "glad", "golden", "grand", "happy", "hasty", "humble", "jolly",
    "keen", "kind", "lively", "loud", "lucky", "mellow", "merry", "mighty", "misty", "neat",
    "nimble", "noble", "perky", "plucky", "proud", "quick", "quiet", "rapid", "rosy", "rusty",
    "shiny", "silent", "sleepy", "sly", "snappy", "snug", "spry", "steady", "sunny", "swift",
    "tidy", "vivid", "wild", "witty",
];

const SECOND_WORDS: &[&str] = &[
    "badger", "bat", "bear", "beaver", "bison", "crane", "crab", "deer", "dove", "duck",
    "eagle", "falcon", "ferret", "finch", "fox", "frog", "gecko", "goose", "hare", "hawk",
    "heron", "horse", "ibis", "koala", "lemur", "lark", "llama", "lynx", "marten", "mole",
    "moose", "moth", "newt", "otter", "owl", "panda", "pike", "plover", "puffin", "quail",
    "rabbit", "raven", "robin", "salmon", "seal", "shrew", "skink", "sparrow", "stoat", "stork",
    "swan", "swift", "tapir", "tern", "toad", "trout", "viper", "vole", "walrus", "wasp",
    "weasel", "wolf", "wren", "yak",
];

/// Separator between the two code words
pub const CODE_SEPARATOR: char = '-';

/// Generate a single candidate code without any uniqueness check
pub fn generate_code() -> LobbyCode {
    let mut rng = rand::rng();
    let first = FIRST_WORDS[rng.random_range(0..FIRST_WORDS.len())];
    let second = SECOND_WORDS[rng.random_range(0..SECOND_WORDS.len())];
    format!("{first}{CODE_SEPARATOR}{second}")
}

/// Generate a code that does not collide with any currently live lobby.
///
/// `is_taken` is queried with the lowercase candidate. The contract does
/// not bound the number of attempts: this loops until a free code exists.
pub fn generate_unique_code<F>(is_taken: F) -> LobbyCode
where
    F: Fn(&str) -> bool,
{
    loop {
        let candidate = generate_code();
        if !is_taken(&candidate) {
            return candidate;
        }
    }
}
