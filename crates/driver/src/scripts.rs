//! In-page scripts for picker controls that cannot be addressed by a fixed
//! selector. Both take `[selector, text]` and return whether a click happened.

/// Clicks the first rendered year control whose text equals `arguments[1]`.
pub const CLICK_YEAR_BY_TEXT: &str = r#"
const [selector, wanted] = arguments;
for (const el of document.querySelectorAll(selector)) {
    if ((el.textContent || '').trim() === wanted) {
        (el.closest('button') || el).click();
        return true;
    }
}
return false;
"#;

/// Clicks the in-month, enabled day control whose number equals `arguments[1]`.
/// Day controls carry more than the digit, so only the `.number` child is
/// compared.
pub const CLICK_ENABLED_DAY: &str = r#"
const [selector, wanted] = arguments;
for (const el of document.querySelectorAll(selector)) {
    if (el.hasAttribute('disabled') || el.classList.contains('disabled') || el.classList.contains('other-scope')) {
        continue;
    }
    const number = el.querySelector('.number') || el;
    if ((number.textContent || '').trim() === wanted) {
        el.click();
        return true;
    }
}
return false;
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_day_script_compares_number_child_only() {
        assert!(CLICK_ENABLED_DAY.contains("el.querySelector('.number') || el"));
        assert!(CLICK_ENABLED_DAY.contains("(number.textContent || '').trim() === wanted"));
        assert!(!CLICK_ENABLED_DAY.contains("(el.textContent"));
    }

    #[test]
    fn test_day_script_skips_disabled_and_neighbouring_month_days() {
        assert!(CLICK_ENABLED_DAY.contains("el.hasAttribute('disabled')"));
        assert!(CLICK_ENABLED_DAY.contains("classList.contains('other-scope')"));
    }
}
