//! Anzeigetext-Aufbereitung fuer Steuernachrichten
//!
//! Der Client zeigt Satz- und Erkennungstexte direkt an. Emoji und
//! Zeilenumbrueche werden vorher entfernt, erkannte Sprache zusaetzlich
//! von fuehrenden und abschliessenden Satzzeichen befreit.

/// Prueft ob ein Zeichen in einem der gaengigen Emoji-Bloecke liegt
pub fn ist_emoji(c: char) -> bool {
    matches!(
        c as u32,
        0x1F000..=0x1FAFF   // Symbole, Emoticons, Piktogramme, Transport
            | 0x2600..=0x27BF // Verschiedene Symbole, Dingbats
            | 0x2B00..=0x2BFF // Pfeile und Sterne
            | 0xFE0F          // Variation Selector-16
            | 0x200D          // Zero Width Joiner
    )
}

/// Prueft ob ein Zeichen ein (ASCII- oder CJK-)Satzzeichen ist
pub fn ist_satzzeichen(c: char) -> bool {
    c.is_ascii_punctuation()
        || matches!(
            c,
            '，' | '。' | '！' | '？' | '；' | '：' | '、' | '…' | '“' | '”' | '‘' | '’'
                | '（' | '）' | '《' | '》' | '【' | '】' | '·' | '～'
        )
}

/// Entfernt Emoji und Zeilenumbrueche aus einem Satztext
pub fn emoji_entfernen(text: &str) -> String {
    text.chars()
        .filter(|&c| !ist_emoji(c) && c != '\n')
        .collect()
}

/// Schneidet fuehrende und abschliessende Satzzeichen, Emoji und Leerraum ab
///
/// Zeichen im Inneren des Textes bleiben unveraendert.
pub fn ohne_satzzeichen_oder_emoji(text: &str) -> String {
    let abschneiden = |c: char| c.is_whitespace() || ist_satzzeichen(c) || ist_emoji(c);
    text.trim_matches(abschneiden).to_owned()
}
