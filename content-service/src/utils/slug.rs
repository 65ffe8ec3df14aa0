//! URL slug generation for posts, categories and tags.

/// Lowercase ASCII slug: alphanumerics kept, every other run of characters
/// collapsed into a single `-`, no leading or trailing dashes.
///
/// Common accented Latin letters are folded to their ASCII base and `&`
/// becomes `and`, so "Tax & Accounting Überblick" → "tax-and-accounting-uberblick".
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut pending_dash = false;

    for ch in input.chars() {
        let folded: Option<&str> = match ch {
            '&' => Some("and"),
            'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' | 'À' | 'Á' | 'Â' | 'Ã' | 'Ä' | 'Å' => Some("a"),
            'è' | 'é' | 'ê' | 'ë' | 'È' | 'É' | 'Ê' | 'Ë' => Some("e"),
            'ì' | 'í' | 'î' | 'ï' | 'Ì' | 'Í' | 'Î' | 'Ï' => Some("i"),
            'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'Ò' | 'Ó' | 'Ô' | 'Õ' | 'Ö' => Some("o"),
            'ù' | 'ú' | 'û' | 'ü' | 'Ù' | 'Ú' | 'Û' | 'Ü' => Some("u"),
            'ñ' | 'Ñ' => Some("n"),
            'ç' | 'Ç' => Some("c"),
            'ß' => Some("ss"),
            '\'' | '’' => Some(""),
            _ => None,
        };

        match folded {
            Some(replacement) => {
                if replacement.is_empty() {
                    continue;
                }
                if pending_dash && !slug.is_empty() {
                    slug.push('-');
                }
                pending_dash = false;
                slug.push_str(replacement);
            }
            None if ch.is_ascii_alphanumeric() => {
                if pending_dash && !slug.is_empty() {
                    slug.push('-');
                }
                pending_dash = false;
                slug.push(ch.to_ascii_lowercase());
            }
            None => pending_dash = true,
        }
    }

    slug
}

/// True when `slug` is already in canonical form.
pub fn is_valid_slug(slug: &str) -> bool {
    !slug.is_empty() && slugify(slug) == slug
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_title() {
        assert_eq!(slugify("5 Tax Tips for Small Businesses"), "5-tax-tips-for-small-businesses");
    }

    #[test]
    fn collapses_punctuation_and_whitespace() {
        assert_eq!(slugify("  Q3 -- Payroll:  What's New?  "), "q3-payroll-whats-new");
    }

    #[test]
    fn folds_accents_and_ampersand() {
        assert_eq!(slugify("Tax & Accounting Überblick"), "tax-and-accounting-uberblick");
    }

    #[test]
    fn empty_and_symbol_only_inputs() {
        assert_eq!(slugify(""), "");
        assert_eq!(slugify("!!!"), "");
    }

    #[test]
    fn validity_check() {
        assert!(is_valid_slug("year-end-planning"));
        assert!(!is_valid_slug("Year-End"));
        assert!(!is_valid_slug("-leading"));
        assert!(!is_valid_slug(""));
    }
}
