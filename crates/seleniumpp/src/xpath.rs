//! XPath construction for attribute, text and label lookups.
//!
//! Every function here is pure: the same arguments always produce the same
//! expression. Values are emitted as XPath string literals that are valid for
//! any input, including values that contain both quote characters.
//!
//! Case folding wraps *both* operands of a comparison in the same
//! `translate(…, 'A…Z', 'a…z')` call, so the rendered DOM text and the literal
//! are folded by an identical mapping. Only ASCII letters fold; this is the
//! limit of XPath 1.0 `translate` and holds for both sides alike.

use serde::{Deserialize, Serialize};

use crate::locator::{Locator, MatchMode, TextMatch};
use crate::result::{SeleniumError, SeleniumResult};

/// Upper-case alphabet fed to `translate`
pub const FOLD_FROM: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Lower-case alphabet fed to `translate`
pub const FOLD_TO: &str = "abcdefghijklmnopqrstuvwxyz";

/// Attributes searched, besides text, by a fuzzy [`text_or_attribute`] lookup
pub const FUZZY_ATTRIBUTES: [&str; 3] = ["class", "aria-label", "placeholder"];

/// Container tags accepted as buttons when they carry `role='button'`
pub const ROLE_BUTTON_TAGS: [&str; 3] = ["span", "div", "a"];

/// Which extra branches a label lookup unions into its expression
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ButtonUnion {
    /// `span`/`div`/`a` elements with `role='button'`
    pub role_containers: bool,
    /// `input` elements of type `button` or `submit`, matched on `@value`
    pub input_buttons: bool,
}

impl Default for ButtonUnion {
    fn default() -> Self {
        Self {
            role_containers: true,
            input_buttons: true,
        }
    }
}

impl ButtonUnion {
    /// Only `button` elements
    #[must_use]
    pub const fn buttons_only() -> Self {
        Self {
            role_containers: false,
            input_buttons: false,
        }
    }
}

/// Quote `value` as an XPath 1.0 string literal.
///
/// ```
/// use seleniumpp::xpath::literal;
///
/// assert_eq!(literal("Submit"), "'Submit'");
/// assert_eq!(literal("it's"), "\"it's\"");
/// assert_eq!(literal(r#"say "it's""#), r#"concat('say "it', "'", 's"')"#);
/// ```
#[must_use]
pub fn literal(value: &str) -> String {
    if !value.contains('\'') {
        return format!("'{value}'");
    }
    if !value.contains('"') {
        return format!("\"{value}\"");
    }
    let parts: Vec<String> = value
        .split('\'')
        .enumerate()
        .flat_map(|(i, part)| {
            let quote = (i > 0).then(|| "\"'\"".to_string());
            let text = (!part.is_empty()).then(|| format!("'{part}'"));
            quote.into_iter().chain(text)
        })
        .collect();
    format!("concat({})", parts.join(", "))
}

/// Collapse runs of XPath whitespace and trim, like `normalize-space()`
#[must_use]
pub fn normalize_space(value: &str) -> String {
    value
        .split([' ', '\t', '\r', '\n'])
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn fold(operand: &str, case_insensitive: bool) -> String {
    if case_insensitive {
        format!("translate({operand}, '{FOLD_FROM}', '{FOLD_TO}')")
    } else {
        operand.to_string()
    }
}

/// Build the comparison of `operand` against `value` under `m`
fn compare(operand: &str, value: &str, m: TextMatch) -> String {
    let lhs = fold(operand, m.case_insensitive);
    let rhs = fold(&literal(value), m.case_insensitive);
    match m.mode {
        MatchMode::Exact => format!("{lhs}={rhs}"),
        MatchMode::Fuzzy => format!("contains({lhs}, {rhs})"),
    }
}

fn check_name(kind: &str, name: &str) -> SeleniumResult<()> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | ':' | '.'))
        && !name.starts_with(|c: char| c.is_ascii_digit() || c == '-' || c == '.');
    if valid {
        Ok(())
    } else {
        Err(SeleniumError::locator_invalid(format!(
            "invalid {kind} name '{name}'"
        )))
    }
}

fn check_tag(tag: &str) -> SeleniumResult<()> {
    if tag == "*" {
        Ok(())
    } else {
        check_name("tag", tag)
    }
}

fn check_value(kind: &str, value: &str) -> SeleniumResult<()> {
    if value.is_empty() {
        Err(SeleniumError::locator_invalid(format!("empty {kind}")))
    } else {
        Ok(())
    }
}

/// `//tag[@attribute='value']` (exact) or `//tag[contains(@attribute, 'value')]` (fuzzy)
pub fn build_xpath(
    tag: &str,
    attribute: &str,
    value: &str,
    m: impl Into<TextMatch>,
) -> SeleniumResult<Locator> {
    check_tag(tag)?;
    check_name("attribute", attribute)?;
    check_value("attribute value", value)?;
    let condition = compare(&format!("@{attribute}"), value, m.into());
    Locator::xpath(format!("//{tag}[{condition}]"))
}

/// Descendants of `tag` that carry `text`.
///
/// Exact mode requires a descendant-or-self node whose own text equals `text`.
/// Fuzzy mode accepts text containment or containment in any of
/// [`FUZZY_ATTRIBUTES`], combined with `or` inside one predicate.
pub fn text_or_attribute(
    text: &str,
    tag: &str,
    m: impl Into<TextMatch>,
) -> SeleniumResult<Locator> {
    check_tag(tag)?;
    check_value("text", text)?;
    let m = m.into();
    let condition = match m.mode {
        MatchMode::Exact => compare("text()", text, m),
        MatchMode::Fuzzy => std::iter::once("text()".to_string())
            .chain(FUZZY_ATTRIBUTES.iter().map(|attr| format!("@{attr}")))
            .map(|operand| compare(&operand, text, m))
            .collect::<Vec<_>>()
            .join(" or "),
    };
    Locator::xpath(format!(".//{tag}[descendant-or-self::*[{condition}]]"))
}

/// `tag` elements whose own text equals `text` (exact) or whose full string
/// value contains it (fuzzy).
pub fn clickable_text(text: &str, tag: &str, m: impl Into<TextMatch>) -> SeleniumResult<Locator> {
    check_tag(tag)?;
    check_value("text", text)?;
    let m = m.into();
    let operand = match m.mode {
        MatchMode::Exact => "text()",
        MatchMode::Fuzzy => ".",
    };
    Locator::xpath(format!(".//{tag}[{}]", compare(operand, text, m)))
}

/// Any element whose own text equals or contains `text`
pub fn any_text(text: &str, m: impl Into<TextMatch>) -> SeleniumResult<Locator> {
    check_value("text", text)?;
    Locator::xpath(format!(".//*[{}]", compare("text()", text, m.into())))
}

/// Composite label lookup for buttons and button-like elements.
///
/// Branches, joined with `|` into one expression:
/// - `button` matched on its own text
/// - `button` whose nested descendants carry the text
/// - `span`/`div`/`a` with `role='button'` matched on their full text
///   (when [`ButtonUnion::role_containers`])
/// - `input` of type `button`/`submit` matched on `@value`
///   (when [`ButtonUnion::input_buttons`])
///
/// Exact mode compares whitespace-normalized text on both sides.
pub fn button_label(
    label: &str,
    m: impl Into<TextMatch>,
    union: ButtonUnion,
) -> SeleniumResult<Locator> {
    let m = m.into();
    let label = match m.mode {
        MatchMode::Exact => normalize_space(label),
        MatchMode::Fuzzy => label.to_string(),
    };
    check_value("label", &label)?;

    let on = |operand: &str| match m.mode {
        MatchMode::Exact => compare(&format!("normalize-space({operand})"), &label, m),
        MatchMode::Fuzzy => compare(operand, &label, m),
    };

    let mut branches = vec![
        format!(".//button[{}]", on("text()")),
        format!(".//button[descendant::*[{}]]", on("text()")),
    ];
    if union.role_containers {
        branches.extend(
            ROLE_BUTTON_TAGS
                .iter()
                .map(|tag| format!(".//{tag}[@role='button'][{}]", on("."))),
        );
    }
    if union.input_buttons {
        branches.push(format!(
            ".//input[@type='button' or @type='submit'][{}]",
            on("@value")
        ));
    }
    Locator::xpath(branches.join(" | "))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::locator::LocatorStrategy;

    mod literal_tests {
        use super::*;

        #[test]
        fn test_plain_literal() {
            assert_eq!(literal("abc"), "'abc'");
        }

        #[test]
        fn test_single_quote_uses_double_quotes() {
            assert_eq!(literal("O'Brien"), "\"O'Brien\"");
        }

        #[test]
        fn test_both_quotes_use_concat() {
            assert_eq!(literal("a'b\"c"), "concat('a', \"'\", 'b\"c')");
            assert_eq!(literal("'\""), "concat(\"'\", '\"')");
        }

        #[test]
        fn test_normalize_space() {
            assert_eq!(normalize_space("  Save \n  draft\t"), "Save draft");
            assert_eq!(normalize_space("   "), "");
        }
    }

    mod build_xpath_tests {
        use super::*;

        #[test]
        fn test_exact() {
            let locator = build_xpath("input", "name", "email", MatchMode::Exact).unwrap();
            assert_eq!(locator.strategy(), LocatorStrategy::XPath);
            assert_eq!(locator.expression(), "//input[@name='email']");
        }

        #[test]
        fn test_fuzzy() {
            let locator = build_xpath("select", "id", "country", MatchMode::Fuzzy).unwrap();
            assert_eq!(locator.expression(), "//select[contains(@id, 'country')]");
        }

        #[test]
        fn test_case_insensitive_folds_both_sides() {
            let m = TextMatch::exact().with_case_insensitive(true);
            let locator = build_xpath("*", "title", "Help", m).unwrap();
            assert_eq!(
                locator.expression(),
                format!(
                    "//*[translate(@title, '{FOLD_FROM}', '{FOLD_TO}')=translate('Help', '{FOLD_FROM}', '{FOLD_TO}')]"
                )
            );
        }

        #[test]
        fn test_rejects_empty_value() {
            let err = build_xpath("input", "name", "", MatchMode::Exact).unwrap_err();
            assert!(matches!(err, SeleniumError::LocatorInvalid { .. }));
        }

        #[test]
        fn test_rejects_bad_names() {
            assert!(build_xpath("", "name", "x", MatchMode::Exact).is_err());
            assert!(build_xpath("input", "na me", "x", MatchMode::Exact).is_err());
            assert!(build_xpath("in]put", "name", "x", MatchMode::Exact).is_err());
            assert!(build_xpath("input", "1st", "x", MatchMode::Exact).is_err());
        }

        #[test]
        fn test_pure() {
            let a = build_xpath("a", "href", "/home", MatchMode::Fuzzy).unwrap();
            let b = build_xpath("a", "href", "/home", MatchMode::Fuzzy).unwrap();
            assert_eq!(a, b);
        }
    }

    mod text_tests {
        use super::*;

        #[test]
        fn test_text_or_attribute_exact() {
            let locator = text_or_attribute("Next", "*", MatchMode::Exact).unwrap();
            assert_eq!(
                locator.expression(),
                ".//*[descendant-or-self::*[text()='Next']]"
            );
        }

        #[test]
        fn test_text_or_attribute_fuzzy_unions_four_conditions() {
            let locator = text_or_attribute("search", "div", MatchMode::Fuzzy).unwrap();
            assert_eq!(
                locator.expression(),
                ".//div[descendant-or-self::*[contains(text(), 'search') or contains(@class, 'search') or contains(@aria-label, 'search') or contains(@placeholder, 'search')]]"
            );
        }

        #[test]
        fn test_clickable_text() {
            let exact = clickable_text("Go", "a", MatchMode::Exact).unwrap();
            assert_eq!(exact.expression(), ".//a[text()='Go']");
            let fuzzy = clickable_text("Go", "*", MatchMode::Fuzzy).unwrap();
            assert_eq!(fuzzy.expression(), ".//*[contains(., 'Go')]");
        }

        #[test]
        fn test_any_text() {
            let locator = any_text("Total", MatchMode::Fuzzy).unwrap();
            assert_eq!(locator.expression(), ".//*[contains(text(), 'Total')]");
        }
    }

    mod button_tests {
        use super::*;

        #[test]
        fn test_buttons_only_exact() {
            let locator =
                button_label(" Submit ", MatchMode::Exact, ButtonUnion::buttons_only()).unwrap();
            assert_eq!(
                locator.expression(),
                ".//button[normalize-space(text())='Submit'] | .//button[descendant::*[normalize-space(text())='Submit']]"
            );
        }

        #[test]
        fn test_full_union_fuzzy() {
            let locator = button_label("Save", MatchMode::Fuzzy, ButtonUnion::default()).unwrap();
            let expr = locator.expression();
            assert_eq!(expr.matches(" | ").count(), 5);
            assert!(expr.contains(".//span[@role='button'][contains(., 'Save')]"));
            assert!(expr.contains(".//div[@role='button']"));
            assert!(expr.contains(".//a[@role='button']"));
            assert!(expr.contains(".//input[@type='button' or @type='submit'][contains(@value, 'Save')]"));
        }

        #[test]
        fn test_whitespace_label_rejected_in_exact_mode() {
            assert!(button_label("   ", MatchMode::Exact, ButtonUnion::default()).is_err());
        }
    }
}
