use unicode_general_category::{GeneralCategory, get_general_category};

/// Turns raw key bytes into a printable string.
///
/// Invalid UTF-8 is replaced, then only letters, marks, numbers,
/// punctuation, symbols and the ASCII space are kept (format characters
/// such as U+200B or U+202E are dropped) and the result is trimmed.
/// Ordinary spaces inside the key survive.
pub fn sanitize_key(raw: &[u8]) -> String {
    let text = String::from_utf8_lossy(raw);
    let kept: String = text.chars().filter(|&c| is_printable(c)).collect();
    kept.trim().to_string()
}

/// Graphic characters plus U+0020.
pub fn is_printable(c: char) -> bool {
    use GeneralCategory::*;

    c == ' '
        || matches!(
            get_general_category(c),
            UppercaseLetter
                | LowercaseLetter
                | TitlecaseLetter
                | ModifierLetter
                | OtherLetter
                | NonspacingMark
                | SpacingMark
                | EnclosingMark
                | DecimalNumber
                | LetterNumber
                | OtherNumber
                | ConnectorPunctuation
                | DashPunctuation
                | OpenPunctuation
                | ClosePunctuation
                | InitialPunctuation
                | FinalPunctuation
                | OtherPunctuation
                | MathSymbol
                | CurrencySymbol
                | ModifierSymbol
                | OtherSymbol
        )
}
