//! Service/item catalogue offered on the service-item step.

use unicode_normalization::UnicodeNormalization;

/// Built-in list of services/items
pub const SERVICE_ITEMS: &[&str] = &[
    "17.11 - PINTURA ACRILICA (COLORIDA)",
    "17.8 - PINTURA DE PISO",
    "19.37 - SUBSTITUIÇÃO DE LÂMPADAS",
];

/// Case-insensitive substring search over the catalogue
pub fn search(query: &str) -> Vec<&'static str> {
    let needle = query.trim().to_lowercase();
    SERVICE_ITEMS
        .iter()
        .copied()
        .filter(|item| item.to_lowercase().contains(&needle))
        .collect()
}

/// Whether a service-item label denotes painting work
pub fn is_painting(label: &str) -> bool {
    label.to_lowercase().contains("pintura")
}

/// Storage-path slug: lowercase, accents stripped, anything outside
/// `[a-z0-9]` replaced by `_`.
pub fn slugify(label: &str) -> String {
    label
        .to_lowercase()
        .nfd()
        .filter(|c| !('\u{0300}'..='\u{036f}').contains(c))
        .map(|c| if c.is_ascii_lowercase() || c.is_ascii_digit() { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_is_case_insensitive() {
        assert_eq!(search("pintura").len(), 2);
        assert_eq!(search("LÂMP"), vec!["19.37 - SUBSTITUIÇÃO DE LÂMPADAS"]);
        assert_eq!(search("").len(), SERVICE_ITEMS.len());
        assert!(search("telhado").is_empty());
    }

    #[test]
    fn test_is_painting() {
        assert!(is_painting("17.8 - PINTURA DE PISO"));
        assert!(is_painting("pintura externa"));
        assert!(!is_painting("19.37 - SUBSTITUIÇÃO DE LÂMPADAS"));
    }

    #[test]
    fn test_slugify() {
        assert_eq!(
            slugify("17.11 - PINTURA ACRILICA (COLORIDA)"),
            "17_11___pintura_acrilica__colorida_"
        );
        assert_eq!(
            slugify("19.37 - SUBSTITUIÇÃO DE LÂMPADAS"),
            "19_37___substituicao_de_lampadas"
        );
    }
}
