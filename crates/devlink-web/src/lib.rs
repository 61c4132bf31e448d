//! devlink Web - Embedded activation pages
//!
//! This crate embeds the activation form, the result page and their static
//! assets into the binary.

use rust_embed::Embed;

#[derive(Embed)]
#[folder = "www/"]
pub struct Assets;

const DONE_TEMPLATE: &str = include_str!("../www/done.html");

/// Message shown on the result page for an activation error number
pub fn done_message(error: Option<&str>) -> &'static str {
    match error {
        None => "Successful Activation",
        Some("1") => "Missing token! Please try again.",
        Some("2") => "Invalid or expired code! Please try again.",
        Some("3") => "Error linking account! Please try again.",
        Some(_) => "Activation error! Please try again.",
    }
}

/// Render the result page
pub fn render_done(error: Option<&str>) -> String {
    DONE_TEMPLATE.replace("{{message}}", done_message(error))
}

/// The activation form
pub fn activate_page() -> Option<Vec<u8>> {
    Assets::get("activate.html").map(|f| f.data.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_done_messages() {
        assert_eq!(done_message(None), "Successful Activation");
        assert_eq!(
            done_message(Some("2")),
            "Invalid or expired code! Please try again."
        );
        assert_eq!(
            done_message(Some("banana")),
            "Activation error! Please try again."
        );
    }

    #[test]
    fn test_render_done_fills_message() {
        let page = render_done(Some("3"));
        assert!(page.contains("Error linking account!"));
        assert!(!page.contains("{{message}}"));
    }

    #[test]
    fn test_assets_embedded() {
        assert!(activate_page().is_some());
        assert!(Assets::get("style.css").is_some());
        assert!(Assets::get("missing.txt").is_none());
    }
}
