//! Display strings for the assistant surface

use super::LanguageCode;

type Table = &'static [(&'static str, &'static str)];

const EN: Table = &[
    ("voiceNotSupported", "Voice recognition is not supported on this device"),
    ("startListening", "Start Listening"),
    ("stopListening", "Stop Listening"),
    ("listening", "Listening"),
    ("availableCommands", "Available commands:"),
    ("commandHome", "\"Go home\" - Home page"),
    ("commandScan", "\"Scan crop\" - Crop scanner"),
    ("commandWeather", "\"Weather\" - Weather forecast"),
    ("commandNASA", "\"Satellite data\" - NASA data"),
    ("commandExpert", "\"Expert advice\" - Expert advice"),
    ("commandStop", "\"Stop\" - Stop listening"),
];

const TE: Table = &[
    ("voiceNotSupported", "ఈ పరికరంలో వాయిస్ గుర్తింపు అందుబాటులో లేదు"),
    ("startListening", "వినడం ప్రారంభించండి"),
    ("stopListening", "వినడం ఆపండి"),
    ("listening", "వింటోంది"),
    ("availableCommands", "అందుబాటులో ఉన్న ఆదేశాలు:"),
    ("commandHome", "\"హోమ్\" - హోమ్ పేజీ"),
    ("commandScan", "\"పంట స్కాన్\" - పంట స్కానర్"),
    ("commandWeather", "\"వాతావరణం\" - వాతావరణ సూచన"),
    ("commandNASA", "\"ఉపగ్రహ డేటా\" - NASA డేటా"),
    ("commandExpert", "\"నిపుణుల సలహా\" - నిపుణుల సలహా"),
    ("commandStop", "\"ఆపు\" - వినడం ఆపండి"),
];

const HI: Table = &[
    ("voiceNotSupported", "इस डिवाइस पर वॉइस पहचान समर्थित नहीं है"),
    ("startListening", "सुनना शुरू करें"),
    ("stopListening", "सुनना बंद करें"),
    ("listening", "सुन रहा है"),
    ("availableCommands", "उपलब्ध आदेश:"),
    ("commandHome", "\"होम\" - होम पेज"),
    ("commandScan", "\"फसल स्कैन\" - फसल स्कैनर"),
    ("commandWeather", "\"मौसम\" - मौसम पूर्वानुमान"),
    ("commandNASA", "\"उपग्रह डेटा\" - NASA डेटा"),
    ("commandExpert", "\"विशेषज्ञ सलाह\" - विशेषज्ञ सलाह"),
    ("commandStop", "\"रुको\" - सुनना बंद करें"),
];

fn table(code: &LanguageCode) -> Option<Table> {
    match code.as_str() {
        LanguageCode::ENGLISH => Some(EN),
        LanguageCode::TELUGU => Some(TE),
        LanguageCode::HINDI => Some(HI),
        _ => None,
    }
}

/// Look up `key` for `code`, falling back to the key itself
pub fn translate<'a>(code: &LanguageCode, key: &'a str) -> &'a str {
    table(code)
        .and_then(|t| t.iter().find(|(k, _)| *k == key))
        .map(|(_, text)| *text)
        .unwrap_or(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_key() {
        let en = LanguageCode::new("en");
        assert_eq!(translate(&en, "startListening"), "Start Listening");
        let hi = LanguageCode::new("hi");
        assert_eq!(translate(&hi, "stopListening"), "सुनना बंद करें");
    }

    #[test]
    fn test_missing_key_falls_back_to_key() {
        let te = LanguageCode::new("te");
        assert_eq!(translate(&te, "noSuchKey"), "noSuchKey");
    }

    #[test]
    fn test_unknown_language_falls_back_to_key() {
        let fr = LanguageCode::new("fr");
        assert_eq!(translate(&fr, "listening"), "listening");
    }

    #[test]
    fn test_tables_cover_same_keys() {
        for (key, _) in EN {
            assert!(TE.iter().any(|(k, _)| k == key), "te missing {key}");
            assert!(HI.iter().any(|(k, _)| k == key), "hi missing {key}");
        }
    }
}
