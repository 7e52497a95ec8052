//! Maps recognised phrases to navigation intents
//!
//! Each language has its own keyword grammar. English covers every intent;
//! Telugu and Hindi only define home and scan for now, and phrases outside
//! a grammar are reported as no match rather than guessed at.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::i18n::LanguageCode;
use crate::router::View;

/// A named navigation target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NavigationIntent {
    Home,
    ScanCrop,
    Weather,
    SatelliteData,
    ExpertAdvice,
    SoilHealth,
    CommunityForum,
    YieldPrediction,
}

impl NavigationIntent {
    pub fn view(&self) -> View {
        match self {
            NavigationIntent::Home => View::Home,
            NavigationIntent::ScanCrop => View::Scan,
            NavigationIntent::Weather => View::Weather,
            NavigationIntent::SatelliteData => View::Nasa,
            NavigationIntent::ExpertAdvice => View::Expert,
            NavigationIntent::SoilHealth => View::Soil,
            NavigationIntent::CommunityForum => View::Forum,
            NavigationIntent::YieldPrediction => View::Yield,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NavigationIntent::Home => "home",
            NavigationIntent::ScanCrop => "scan-crop",
            NavigationIntent::Weather => "weather",
            NavigationIntent::SatelliteData => "satellite-data",
            NavigationIntent::ExpertAdvice => "expert-advice",
            NavigationIntent::SoilHealth => "soil-health",
            NavigationIntent::CommunityForum => "community-forum",
            NavigationIntent::YieldPrediction => "yield-prediction",
        }
    }
}

impl fmt::Display for NavigationIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One intent in a grammar, with the phrase shown when it is chosen
#[derive(Debug)]
pub struct Rule {
    pub intent: NavigationIntent,
    pub keywords: &'static [&'static str],
    pub confirmation: &'static str,
}

// Rules are listed in priority order: earlier rules win within a phrase.
const ENGLISH: &[Rule] = &[
    Rule {
        intent: NavigationIntent::Home,
        keywords: &["home", "main", "house"],
        confirmation: "Navigating to home",
    },
    Rule {
        intent: NavigationIntent::ScanCrop,
        keywords: &["scan", "crop", "plant"],
        confirmation: "Navigating to crop scanner",
    },
    Rule {
        intent: NavigationIntent::Weather,
        keywords: &["weather", "rain", "forecast"],
        confirmation: "Navigating to weather",
    },
    Rule {
        intent: NavigationIntent::SatelliteData,
        keywords: &["nasa", "satellite", "data"],
        confirmation: "Navigating to NASA data",
    },
    Rule {
        intent: NavigationIntent::ExpertAdvice,
        keywords: &["expert", "advice", "help"],
        confirmation: "Navigating to expert advice",
    },
    Rule {
        intent: NavigationIntent::SoilHealth,
        keywords: &["soil", "health", "test"],
        confirmation: "Navigating to soil health",
    },
    Rule {
        intent: NavigationIntent::CommunityForum,
        keywords: &["forum", "community", "discuss"],
        confirmation: "Navigating to community forum",
    },
    Rule {
        intent: NavigationIntent::YieldPrediction,
        keywords: &["yield", "prediction", "harvest"],
        confirmation: "Navigating to yield prediction",
    },
];

const TELUGU: &[Rule] = &[
    Rule {
        intent: NavigationIntent::Home,
        keywords: &["హోమ్", "ముఖ్య", "గృహ"],
        confirmation: "హోమ్‌కి నావిగేట్ చేస్తున్నారు",
    },
    Rule {
        intent: NavigationIntent::ScanCrop,
        keywords: &["స్కాన్", "పంట", "మొక్క"],
        confirmation: "పంట స్కానర్‌కి నావిగేట్ చేస్తున్నారు",
    },
];

const HINDI: &[Rule] = &[
    Rule {
        intent: NavigationIntent::Home,
        keywords: &["होम", "मुख्य", "घर"],
        confirmation: "होम पर नेविगेट कर रहे हैं",
    },
    Rule {
        intent: NavigationIntent::ScanCrop,
        keywords: &["स्कैन", "फसल", "पौधा"],
        confirmation: "फसल स्कैनर पर नेविगेट कर रहे हैं",
    },
];

/// Grammar for a language; codes without one use English, matching the
/// `en-US` locale they are captured in.
pub fn grammar(language: &LanguageCode) -> &'static [Rule] {
    match language.as_str() {
        LanguageCode::TELUGU => TELUGU,
        LanguageCode::HINDI => HINDI,
        _ => ENGLISH,
    }
}

/// Outcome of interpreting one utterance
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Interpretation {
    Resolved {
        intent: NavigationIntent,
        confirmation: &'static str,
    },
    NoMatch,
}

/// Interpret ranked alternatives under `language`'s grammar
///
/// Alternatives are tried best first. The first one containing any keyword
/// resolves, and within it rules are tried in priority order.
pub fn interpret<S: AsRef<str>>(alternatives: &[S], language: &LanguageCode) -> Interpretation {
    let rules = grammar(language);

    for alternative in alternatives {
        let phrase = alternative.as_ref().to_lowercase();
        let hit = rules
            .iter()
            .find(|rule| rule.keywords.iter().any(|kw| phrase.contains(kw)));

        if let Some(rule) = hit {
            return Interpretation::Resolved {
                intent: rule.intent,
                confirmation: rule.confirmation,
            };
        }
    }

    Interpretation::NoMatch
}
