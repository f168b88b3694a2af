//! Built-in pattern sets used when the settings file does not override them.

/// Case-insensitive regexes checked against the whole command line. Several of
/// them intentionally span operators (`curl ... | sh`), which is why they run
/// before the line is split.
pub const DANGEROUS_PATTERNS: &[&str] = &[
    r"\brm\s+(-[a-z]*r[a-z]*f|-[a-z]*f[a-z]*r)[a-z]*\b",
    r"\brm\s+.*--recursive\b.*--force\b",
    r"\brm\s+.*--force\b.*--recursive\b",
    r"\bmkfs(\.\w+)?\b",
    r"\bdd\s+.*\bof=/dev/",
    r">\s*/dev/(sd[a-z]|nvme\d|disk\d)",
    r":\(\)\s*\{\s*:\s*\|\s*:\s*&\s*\}\s*;\s*:",
    r"\bchmod\s+(-r\s+)?777\s+/",
    r"\bchown\s+-r\s+\S+\s+/\s*$",
    r"\b(shutdown|reboot|halt|poweroff)\b",
    r"\bgit\s+push\b.*(\s--force\b|\s-f\b)",
    r"\bgit\s+reset\s+--hard\b",
    r"\bgit\s+clean\s+-[a-z]*f",
    r"\b(curl|wget)\b.*\|\s*(sudo\s+)?(ba|z|k)?sh\b",
    r"\bsudo\b",
    r"\bfind\b.*\s-delete\b",
    r"\bfind\b.*\s-(exec|execdir|ok|okdir)\b",
    r"\bdrop\s+(table|database|schema)\b",
];

/// Command prefixes that are allowed to run without confirmation. Multi-word
/// entries only match when the subcommand starts with the same words.
pub const SAFE_PATTERNS: &[&str] = &[
    // Navigation and inspection
    "cd",
    "ls",
    "pwd",
    "tree",
    "cat",
    "head",
    "tail",
    "less",
    "wc",
    "stat",
    "file",
    "du",
    "df",
    "which",
    "echo",
    "printf",
    "true",
    "false",
    // Search and text processing
    "grep",
    "rg",
    "find",
    "fd",
    "sort",
    "uniq",
    "cut",
    "diff",
    "jq",
    // Version control, read-only
    "git status",
    "git log",
    "git diff",
    "git show",
    "git branch --list",
    "git branch --show-current",
    "git remote -v",
    // Build and test tooling
    "cargo",
    "npm",
    "yarn",
    "pnpm",
    "node",
    "tsc",
    "python",
    "python3",
    "pytest",
    "go build",
    "go test",
    "go vet",
    "make",
];

pub fn default_dangerous_patterns() -> Vec<String> {
    DANGEROUS_PATTERNS.iter().map(|p| p.to_string()).collect()
}

pub fn default_safe_patterns() -> Vec<String> {
    SAFE_PATTERNS.iter().map(|p| p.to_string()).collect()
}
