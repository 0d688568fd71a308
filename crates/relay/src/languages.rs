/// A supported target language: display label, ISO 639-1 code, BCP 47 locale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LanguageSpec {
    pub label: &'static str,
    pub code: &'static str,
    pub locale: &'static str,
}

/// Languages the translation pipeline can target. The first entry is the
/// fallback whenever a requested language cannot be resolved.
pub const SUPPORTED_LANGUAGES: &[LanguageSpec] = &[
    LanguageSpec { label: "English", code: "en", locale: "en-US" },
    LanguageSpec { label: "Spanish", code: "es", locale: "es-MX" },
    LanguageSpec { label: "French", code: "fr", locale: "fr-FR" },
    LanguageSpec { label: "German", code: "de", locale: "de-DE" },
    LanguageSpec { label: "Portuguese", code: "pt", locale: "pt-BR" },
    LanguageSpec { label: "Chinese", code: "zh", locale: "zh-CN" },
    LanguageSpec { label: "Japanese", code: "ja", locale: "ja-JP" },
    LanguageSpec { label: "Korean", code: "ko", locale: "ko-KR" },
    LanguageSpec { label: "Hindi", code: "hi", locale: "hi-IN" },
    LanguageSpec { label: "Turkish", code: "tr", locale: "tr-TR" },
    LanguageSpec { label: "Russian", code: "ru", locale: "ru-RU" },
    LanguageSpec { label: "Arabic", code: "ar", locale: "ar-SA" },
];

/// Returns the fallback language (the first table entry).
pub fn default_language() -> &'static LanguageSpec {
    &SUPPORTED_LANGUAGES[0]
}

/// Resolves a language by display label, falling back to the default.
pub fn resolve_label(label: &str) -> &'static LanguageSpec {
    SUPPORTED_LANGUAGES
        .iter()
        .find(|l| l.label == label)
        .unwrap_or_else(default_language)
}

/// Resolves a language by ISO code, falling back to the default.
pub fn resolve_code(code: &str) -> &'static LanguageSpec {
    SUPPORTED_LANGUAGES
        .iter()
        .find(|l| l.code == code)
        .unwrap_or_else(default_language)
}
