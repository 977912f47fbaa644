//! Plain status lines for the person running the tool.

const RULE_WIDTH: usize = 60;

pub fn rule() -> String {
    "=".repeat(RULE_WIDTH)
}

pub fn header(text: &str) {
    println!("\n{}", rule());
    println!("  {text}");
    println!("{}", rule());
}

pub fn success(text: &str) {
    println!("✓ {text}");
}

pub fn info(text: &str) {
    println!("ℹ {text}");
}

pub fn warn(text: &str) {
    println!("⚠ {text}");
}

pub fn error(text: &str) {
    eprintln!("✗ {text}");
}
