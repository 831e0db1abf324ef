//! Icons for step and status lines.

use console::Emoji;

// Status indicators
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "[OK]");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "[ERR]");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "[WARN]");

// Steps
pub static ARROW: Emoji<'_, '_> = Emoji("▶️  ", "==>");
pub static FILE_NEW: Emoji<'_, '_> = Emoji("📄 ", "+");
pub static KEY: Emoji<'_, '_> = Emoji("🔑 ", "[KEY]");
