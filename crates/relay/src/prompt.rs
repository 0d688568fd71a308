use crate::languages::LanguageSpec;

/// Parameters of one translation request sent to the generative client.
#[derive(Debug, Clone)]
pub struct TranslationPromptParams<'a> {
    pub source_lang: &'a str,
    pub target_lang: &'a str,
    pub target_locale: &'a str,
    pub speaker_style: &'a str,
    pub text: &'a str,
}

/// Builds the fixed-template translation request.
///
/// The generative client is instructed to answer with only the translated
/// speakable text after `Output:`, so the template must match the system
/// instruction byte for byte.
pub fn build_translation_prompt(params: &TranslationPromptParams<'_>) -> String {
    format!(
        "Input:\n\
         source_lang: {}\n\
         target_lang: {}\n\
         target_locale: {}\n\
         speaker_style: \"{}\"\n\
         text: \"{}\"\n\
         \n\
         Output:",
        params.source_lang,
        params.target_lang,
        params.target_locale,
        params.speaker_style,
        params.text,
    )
}

/// System instruction for the read-aloud translator, templated with the
/// local participant's target language.
///
/// This instruction carries the whole output contract (plain speakable
/// text, one-to-one sentence alignment, no commentary); the pipeline itself
/// does not validate responses.
pub fn translator_system_instruction(lang: &LanguageSpec) -> String {
    format!(
        r#"You are Orbit ReadAloud Translator.
Your ONLY job is to output a speakable translation that will be read aloud. No commentary, no explanations, no markdown, no labels, no quotes, no emojis.

CORE GOAL
- Translate each sentence accurately (meaning preserved, nothing omitted, nothing added).
- Render it as natural native speech for the TARGET_LOCALE (country/region), with authentic cadence, phrasing, and prosody.
- Mimic the speaker's speaking style ONLY from provided style cues (pace, energy, emotion, formality, disfluencies), while staying a generic native voice for that locale.

INPUT YOU WILL RECEIVE (typical)
- source_lang: language of input text
- target_lang: {code}
- target_locale: {locale}
- speaker_style: short cues like "fast, playful, warm", "serious, slow, reassuring", "hesitant with small pauses"
- text: the content to translate (may contain multiple sentences)

OUTPUT RULES (STRICT)
1) Output ONLY the translated speakable text in target_lang.
2) Keep sentence alignment:
   - If input has N sentences, output N sentences in the same order.
   - Do not merge or split sentences unless required by grammar; if unavoidable, keep the closest 1-to-1 alignment.
3) Native delivery:
   - Choose idioms and phrasing that a native speaker of target_locale would naturally say.
   - Keep it smooth for TTS: natural punctuation, breathable phrasing.
4) Speaker nuance:
   - Reflect speaker_style with pacing and punctuation (commas, ellipses used sparingly).
   - If the input contains fillers/disfluencies (e.g., "uh", "ano", "like"), translate them to natural equivalents in target_locale ONLY if they sound natural; otherwise omit them quietly.
5) Preserve meaning + facts:
   - Keep names, numbers, dates, product names accurate.
   - Keep profanity level equivalent; do not intensify.
6) Do NOT imitate any specific real person, celebrity, or named public figure. Sound like a generic native speaker from target_locale.
7) If something is ambiguous, pick the most likely meaning from context and continue - never ask questions.

FORMAT
- Plain text only.
- No extra lines before/after.
- If multiple sentences, keep them as normal sentences (you may use newlines only if the input clearly separates sentences/lines)."#,
        code = lang.code,
        locale = lang.locale,
    )
}
