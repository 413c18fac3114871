//! Prompt texts for the completion stages. Kept in Czech to match the source
//! documents; the parsers in `pipeline::analysis` rely on the heading words
//! used here.

/// System role shared by every completion request.
pub const SYSTEM_PROMPT: &str = "Jsi asistent v oblasti územního plánování.";

/// Per-chunk instruction: up to 3 problems and 3 trends, 8 words each,
/// bulleted, no commentary.
pub const CHUNK_PROMPT: &str = "\
Jsi odborník na územní a krajinné plánování. Na základě následující části územního plánu identifikuj:

- Maximálně 3 konkrétní problémy, každý nejvýše 8 slov.
- Maximálně 3 konkrétní rozvojové trendy, každý nejvýše 8 slov.

Nepřidávej komentáře. Výstup uveď jako dva seznamy s odrážkami. Zaměř se na rozvoj území a strategickou koncepci obce. Dále se zabývej zejména charakterem území, jeho vymezením a specifiky související s územním rozvojem v dané obci.

Část plánu:
";

/// Aggregate instruction: 5 problems and 5 trends under the headings the
/// parser recognises.
pub const ANALYSIS_PROMPT: &str = "\
Jsi analytik územního plánování. Na základě následujících výstupů z územního plánu obce vytvoř:

- Seznam 5 hlavních problémů (max 8 slov, bez duplicit).
- Seznam 5 hlavních trendů (max 8 slov, bez duplicit).

Výstup uveď jako dva seznamy s odrážkami nadepsané jako hlavní problémy nebo hlavní trendy. Zaměř se na rozvoj území a strategickou koncepci obce. Dále se zabývej zejména charakterem území, jeho vymezením a specifiky souvisejícími s územním rozvojem v dané obci.

Výstupy z analýzy:
";

/// Narrative instruction: a summary of at most 140 words.
pub const SUMMARY_PROMPT: &str = "\
Na základě následujícího textu z územního plánu obce napiš krátké shrnutí (maximálně 140 slov), které zdůrazní specifika a jedinečné charakteristiky plánování v této konkrétní obci. Zaměř se na rozvoj území a strategickou koncepci obce. Dále se zabývej zejména charakterem území, jeho vymezením a specifiky souvisejícími s územním rozvojem v dané obci.

Text plánu:
";

/// Appends the excerpt to a prompt inside a fenced block.
pub fn with_excerpt(prompt: &str, excerpt: &str) -> String {
    format!("{prompt}\n'''\n{excerpt}\n'''")
}
