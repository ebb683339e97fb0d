// ABOUTME: Version, REPL strings, and reader limits

pub const VERSION: &str = "0.1.0";
pub const WELCOME_MESSAGE: &str = "cellisp v0.1.0";
pub const PROMPT: &str = "> ";
pub const HISTORY_FILE: &str = ".cellisp_history";

/// Longest accepted symbol name, in bytes.
pub const MAX_SYMBOL_LEN: usize = 1024;
