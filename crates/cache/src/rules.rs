//! Never-cache rules
//!
//! An explicit regex set that overrides the category decision. Anything
//! state-changing, context-dependent, personal, or requiring a live LLM
//! read must never be answered from cache.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::category::CacheCategory;

static UNCACHEABLE: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        // Time and scheduling
        r"\bwhat time\b",
        r"\bwhat.{0,10}date\b",
        r"\bcurrent time\b",
        r"\bschedule\b",
        r"\bremind me\b",
        // Device-state-changing commands
        r"\bturn (on|off)\b",
        r"\bset\s+(the\s+)?temperature\b",
        r"\bset\s+(the\s+)?lights?\b",
        r"\bmake\s+(the\s+)?(it|lights?|room)\b",
        r"\bchange\s+(the\s+)?(lights?|color)\b",
        r"\bhit\s+the\s+lights?\b",
        r"\bcut\s+the\s+lights?\b",
        r"\bkill\s+all\b",
        r"\bshut\s+(it\s+)?off\b",
        r"\bflip\s+(em|them|the)\b",
        r"\bbring\s+(up|down)\s+the\s+lights?\b",
        r"\bbring\s+(the\s+)?lights?\s+down\b",
        r"\bevery\s+light\s+(on|off)\b",
        r"\boff\s+with\s+the\s+lights?\b",
        r"\bthrow\s+on\s+.+lights?\b",
        r"\blight\s+me\s+up\b",
        r"\blights?\s+please\b",
        r"\bsome\s+light\b",
        r"\bno\s+more\s+lights?\b",
        // Color and brightness words
        r"\b(blue|red|green|yellow|orange|purple|pink|cyan|magenta|white)\b",
        r"\b(sunset|sunrise|ocean|christmas|rainbow|forest|fire)\b",
        r"\b(dim|bright|brightness|brighter|dimmer|fade)\b",
        r"\bsuper\s+bright\b",
        r"\bnot\s+so\s+bright\b",
        r"\btoo\s+much\s+light\b",
        r"\btone\s+down\b",
        r"\bdarken\s+it\s+up\b",
        r"\bkinda\s+dim\b",
        r"\blooking\s+dim\b",
        r"\bon\s+low\b",
        r"\bvibe\b",
        r"\brandom\s+colors?\b",
        r"\bchristmas\s+colors?\b",
        r"\bset\s+the\s+mood\b",
        r"\blit\b",
        // Room-context cues
        r"\bmore\s+light\b",
        r"\bless\s+light\b",
        r"\btoo\s+dark\b",
        r"\btoo\s+bright\b",
        r"\bmake\s+it\s+cozy\b",
        r"\bbrighten\s+up\b",
        r"\bin\s+here\b",
        r"\bcan'?t\s+see\b",
        r"\bhard\s+to\s+see\b",
        r"\beasy\s+on\s+my\s+eyes\b",
        // Greetings
        r"^good\s+(morning|afternoon|evening|night)$",
        r"^(hello|hi|hey)\b",
        // Presence and occupancy
        r"\banyone\s+home\b",
        r"\banybody\s+home\b",
        r"\bwho.{0,5}home\b",
        r"\bis\s+(anyone|anybody)\b",
        r"\banybody\s+in\b",
        r"\banyone\s+in\b",
        r"\bsomeone\s+in\b",
        r"\boccupancy\b",
        // Music control
        r"^resume$",
        r"\bresume\s+(the\s+)?music\b",
        r"\bpause\b",
        r"\bnext\s+(song|track)\b",
        r"^(next|skip|stop|previous)$",
        r"\bskip\b",
        r"\b(louder|quieter)\b",
        r"\bvolume\s+(up|down|way\s+up)\b",
        r"\bturn\s+it\s+(up|down)\b",
        r"\b(shuffle|repeat|loop)\b",
        r"\bcrank\s+(this|that)\b",
        r"\bpump\s+up\s+the\s+jam\b",
        r"\bmore\s+volume\b",
        r"\bless\s+volume\b",
        r"\bnoise\s+down\b",
        r"\bcan'?t\s+hear\b",
        r"\bhold\s+up\b",
        r"\bwhats?\s+(that|this|the)\s+song\b",
        r"\bsong\s+(called|name)\b",
        r"\bplayin\s+rn\b",
        // Locks
        r"\block\b",
        r"\bunlock\b",
        r"\bdid\s+i\s+lock\b",
        r"\bhave\s+i\s+locked\b",
        // Whole-house control and exclusions
        r"\ball\s+(the\s+)?lights\b",
        r"\beverything\s+(on|off)\b",
        r"\bturn\s+everything\b",
        r"\bexcept\b",
        r"\bleave\s+.+\s+on\s+.+\s+turn\s+off\b",
        // Indoor climate
        r"\btemperature\s+(inside|in\s+(the\s+)?house|in\s+here)\b",
        r"\b(inside|indoor|indoors)\s+temp(erature)?\b",
        r"\b(thermostat|hvac|heat|ac|heating|cooling)\b",
        r"\bmake\s+it\s+(warmer|cooler|hotter|colder)\b",
        r"\bdrop\s+(the|that?)\s+temp(erature)?\b",
        r"\bmad\s+(cold|hot)\b",
        r"\btemp\s+we\s+at\b",
        r"\bwarm\s+up\s+my\s+side\b",
        // Window and sensor state
        r"\bwindows?\s+open\b",
        r"\bany\s+lights\b",
        r"\blights\s+left\s+on\b",
        r"\bair\s+moving\b",
        r"\bdoor\s+good\b",
        // Personal memory
        r"\b(my|i|me|mine)\b.*\b(own|have|drive|car|vehicle|tesla)\b",
        r"\b(what|which)\b.*\b(do i|did i|my)\b",
        r"\b(how many|how much)\b.*\b(did i|do i|my)\b",
        r"\b(when did|where did|why did)\b.*\b(i|my)\b",
        r"\babout m[ey]\b",
        r"\bmy name\b",
        r"\bwho am i\b",
        r"\bremember\b",
        r"\bforget\b",
        // False-memory claims about earlier sessions
        r"\blast\s+time\s+you\s+said\b",
        r"\byou\s+told\s+me\s+(last|before|earlier)\b",
        // Problem reports
        r"\bnot (getting|working|turning|heating|cooling)\b",
        r"\b(isn't|isnt|won't|wont|doesn't|doesnt|can't|cant)\s+(work|turn|show|heat|cool|connect)",
        r"\bstopped (working|heating|cooling|responding)\b",
        r"\b(broken|stuck|failed|failing|error)\b",
        r"\bno (power|signal|response|sound|heat|cold|water)\b",
        r"\bkeeps (turning|shutting|stopping|freezing|crashing)\b",
        r"\b(problem|issue) with\b",
        r"\bsomething.{0,10}wrong\b",
        // Pronoun-based follow-ups
        r"\bwhat\s+(team|sport|position|city|state|country|year|age)\s+does\s+(he|she|they)\b",
        r"\bwhere\s+does\s+(he|she|they)\b",
        r"\bwhen\s+did\s+(he|she|they)\b",
        r"\bhow\s+(old|tall|much|many)\s+(is|was|are|were)\s+(he|she|they)\b",
        r"\bwho\s+is\s+(he|she|they)\b",
        // Context-dependent follow-ups
        r"^tell\s+me\s+more",
        r"\btell\s+me\s+more\b",
        r"\bthe\s+(first|second|third)\s+(one|story|option)\b",
        r"^where\s+can\s+i\s+read\b",
        r"^what\s+about\s+",
        r"^do\s+they\s+have\b",
        r"^are\s+they\s+open\b",
        r"^whats?\s+their\s+",
        r"^whats?\s+the\s+price\b",
        r"^which\s+(one|would|has|is)\s+",
        r"\bwhere\s+was\s+that\b",
        r"\bwhat\s+was\s+the\s+name\s+again\b",
        // Hypotheticals and advice that want a live model
        r"\bhypothetically\b",
        r"\bwhat\s+if\s+i\s+(want|hate|only|just|find|gave|had)\b",
        r"\bhow\s+should\s+i\s+(train|learn|start|begin|prepare)\b",
        r"\blets?\s+say\b",
        r"\bassuming\s+i\b",
        r"\bworth\s+it\b",
        r"\beasiest\s+way\b",
        r"what\s+should\s+(we|i)\s+do\b",
        r"if\s+its?\s+(sunny|rain)",
        r"if\s+the\s+weather\b",
        // Slang needing a live read
        r"\bwhats?\s+the\s+damage\b",
        r"\bdeadass\b",
        r"\bno\s+cap\b",
        r"\bfinna\b",
        // Emotional venting
        r"\b(work\s+was\s+terrible|today\s+sucked|bad\s+day)\b",
        r"\bugh\b",
        r"\bi\s+just\s+want\s+comfort\b",
        // Sarcastic reactions and impossible requests
        r"^(shocking|surprised)$",
        r"\bmake\s+me\s+a\s+sandwich\b",
        r"\b(thanks\s+nerd|cool\s+thanks)\b",
        r"\btomorrow\s+will\s+be\s+better\b",
        r"\bcall\s+them\b",
        // Continuations
        r"\bcontinue\s+where\s+you\s+left\b",
        r"\bplease\s+continue\b",
        r"\bkeep\s+going\b",
        r"\bwhat\s+happens\s+next\b",
        r"\bgo\s+on\b",
        r"\bfinish\s+(the|that|your)\b",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("never-cache regex"))
    .collect()
});

/// Whether a query may be cached at all.
///
/// Both the category TTL and the never-cache patterns must pass; any
/// pattern match wins over the category decision.
pub fn is_cacheable(category: CacheCategory, query: &str) -> bool {
    if category.ttl_seconds() == 0 {
        return false;
    }

    let lower = query.to_lowercase();
    for pattern in UNCACHEABLE.iter() {
        if pattern.is_match(&lower) {
            tracing::debug!(pattern = pattern.as_str(), "never-cache rule matched");
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::category::extract_semantic_intent;

    fn cacheable(query: &str) -> bool {
        let (category, _) = extract_semantic_intent(query);
        is_cacheable(category, query)
    }

    #[test]
    fn test_zero_ttl_categories_never_cache() {
        assert!(!cacheable("what time is it"));
        assert!(!cacheable("turn off the office lights"));
    }

    #[test]
    fn test_followups_never_cache() {
        assert!(!cacheable("tell me more about the first one"));
        assert!(!cacheable("are they open tomorrow"));
        assert!(!cacheable("which one is better"));
        assert!(!cacheable("where was that restaurant"));
    }

    #[test]
    fn test_personal_memory_never_caches() {
        assert!(!cacheable("what car do i drive"));
        assert!(!cacheable("remember that i parked on level 3"));
        assert!(!cacheable("who am i"));
    }

    #[test]
    fn test_problem_reports_never_cache() {
        assert!(!cacheable("the heat is not working"));
        assert!(!cacheable("the tv keeps crashing"));
    }

    #[test]
    fn test_music_and_locks_never_cache() {
        assert!(!cacheable("skip"));
        assert!(!cacheable("volume up"));
        assert!(!cacheable("did i lock the front door"));
    }

    #[test]
    fn test_plain_info_queries_are_cacheable() {
        assert!(cacheable("what's the weather"));
        assert!(cacheable("good greek place in philly"));
        assert!(cacheable("nfl standings"));
        assert!(cacheable("recipe for lasagna"));
    }

    #[test]
    fn test_slang_needs_live_llm() {
        assert!(!cacheable("whats the damage for dinner there"));
    }
}
