//! Shared UI icons.

use console::Emoji;

// Status indicators
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "[OK]");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "[ERR]");
pub static SPARKLE: Emoji<'_, '_> = Emoji("✨ ", "*");
pub static PAUSE: Emoji<'_, '_> = Emoji("⏸️  ", "[||]");

// Timeline indicators
pub static PATH: Emoji<'_, '_> = Emoji("🔀 ", "->");
pub static MOMENT: Emoji<'_, '_> = Emoji("📍 ", "-");
pub static VIDEO: Emoji<'_, '_> = Emoji("🎬 ", "[V]");

// Cache and sync indicators
pub static CACHE: Emoji<'_, '_> = Emoji("🗂️  ", "[C]");
pub static SYNC: Emoji<'_, '_> = Emoji("🔄 ", "[S]");
pub static CLOCK: Emoji<'_, '_> = Emoji("⏱️  ", "[T]");
