/// One line of a scripted conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulatedLine {
    pub speaker: String,
    pub language: String,
    pub text: String,
}

impl SimulatedLine {
    pub fn new(speaker: &str, language: &str, text: &str) -> Self {
        Self {
            speaker: speaker.into(),
            language: language.into(),
            text: text.into(),
        }
    }
}

const CHAIR: &str = "Council Chair (English)";
const MEMBER: &str = "Council Member (Spanish)";

/// A bilingual council meeting about a community park.
pub fn council_meeting() -> Vec<SimulatedLine> {
    vec![
        SimulatedLine::new(
            CHAIR,
            "en-US",
            "Good afternoon, everyone. Thank you for joining today's meeting. We'll discuss the new community park project and its budget allocation.",
        ),
        SimulatedLine::new(
            MEMBER,
            "es-ES",
            "Buenas tardes. Este proyecto es muy importante para nuestra comunidad. Queremos asegurarnos de que el diseño incluya áreas verdes y espacios para niños.",
        ),
        SimulatedLine::new(
            CHAIR,
            "en-US",
            "I completely agree. We also need to consider accessibility for seniors and people with disabilities. The design should be inclusive.",
        ),
        SimulatedLine::new(
            MEMBER,
            "es-ES",
            "Perfecto. También necesitamos considerar el mantenimiento a largo plazo. ¿Cuál es el presupuesto anual propuesto?",
        ),
        SimulatedLine::new(
            CHAIR,
            "en-US",
            "The proposed budget is two hundred fifty thousand dollars for construction, with an annual maintenance budget of thirty thousand dollars.",
        ),
        SimulatedLine::new(
            MEMBER,
            "es-ES",
            "¿Cuándo planeamos comenzar la construcción? La comunidad está muy emocionada por este proyecto.",
        ),
        SimulatedLine::new(
            CHAIR,
            "en-US",
            "The goal is to start in early spring, once the budget is approved. We should have completion by next fall.",
        ),
        SimulatedLine::new(
            MEMBER,
            "es-ES",
            "Excelente. Propongo que votemos hoy para aprobar el presupuesto y podamos avanzar con el proyecto.",
        ),
    ]
}
