//! Shared UI icons and emojis.
//!
//! Every icon carries a plain-text fallback for terminals without emoji
//! support.

use console::Emoji;

use crate::view::Icon;

// Status indicators
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "[OK] ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "[ERR] ");

// Tree icons
pub static MICROCLIMATE: Emoji<'_, '_> = Emoji("☁️  ", "[mc] ");
pub static DISCONNECTED: Emoji<'_, '_> = Emoji("🔌 ", "[--] ");
pub static ERROR: Emoji<'_, '_> = Emoji("⚠️  ", "[!] ");
pub static JAVA: Emoji<'_, '_> = Emoji("☕ ", "[java] ");
pub static NODE: Emoji<'_, '_> = Emoji("🟩 ", "[node] ");
pub static SWIFT: Emoji<'_, '_> = Emoji("🐦 ", "[swift] ");
pub static PYTHON: Emoji<'_, '_> = Emoji("🐍 ", "[py] ");
pub static GO: Emoji<'_, '_> = Emoji("🐹 ", "[go] ");
pub static DOCKER: Emoji<'_, '_> = Emoji("🐳 ", "[docker] ");

pub fn icon_emoji(icon: Icon) -> Emoji<'static, 'static> {
    match icon {
        Icon::Microclimate => MICROCLIMATE,
        Icon::Disconnected => DISCONNECTED,
        Icon::Error => ERROR,
        Icon::Java => JAVA,
        Icon::Node => NODE,
        Icon::Swift => SWIFT,
        Icon::Python => PYTHON,
        Icon::Go => GO,
        Icon::Docker => DOCKER,
    }
}
