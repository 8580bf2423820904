/// Shown when the lookup table has no translation for a line.
pub const PLACEHOLDER: &str = "[Translation from Azure would appear here]";

/// Stands in for the translation backend in demo mode.
pub trait Translator: Send + Sync {
    fn translate(&self, text: &str, from: &str, to: &str) -> String;

    /// The language a line in `language` is translated into by default.
    fn counterpart(&self, _language: &str) -> Option<&str> {
        None
    }
}

struct Entry {
    from: &'static str,
    to: &'static str,
    source: &'static str,
    target: &'static str,
}

const COUNCIL_TABLE: &[Entry] = &[
    Entry {
        from: "en-US",
        to: "es-ES",
        source: "Good afternoon, everyone. Thank you for joining today's meeting. We'll discuss the new community park project and its budget allocation.",
        target: "Buenas tardes a todos. Gracias por unirse a la reunión de hoy. Discutiremos el nuevo proyecto del parque comunitario y su asignación presupuestaria.",
    },
    Entry {
        from: "en-US",
        to: "es-ES",
        source: "I completely agree. We also need to consider accessibility for seniors and people with disabilities. The design should be inclusive.",
        target: "Estoy completamente de acuerdo. También debemos considerar la accesibilidad para personas mayores y personas con discapacidades. El diseño debe ser inclusivo.",
    },
    Entry {
        from: "en-US",
        to: "es-ES",
        source: "The proposed budget is two hundred fifty thousand dollars for construction, with an annual maintenance budget of thirty thousand dollars.",
        target: "El presupuesto propuesto es de doscientos cincuenta mil dólares para la construcción, con un presupuesto de mantenimiento anual de treinta mil dólares.",
    },
    Entry {
        from: "en-US",
        to: "es-ES",
        source: "The goal is to start in early spring, once the budget is approved. We should have completion by next fall.",
        target: "El objetivo es comenzar a principios de la primavera, una vez que se apruebe el presupuesto. Deberíamos tener la finalización para el próximo otoño.",
    },
    Entry {
        from: "es-ES",
        to: "en-US",
        source: "Buenas tardes. Este proyecto es muy importante para nuestra comunidad. Queremos asegurarnos de que el diseño incluya áreas verdes y espacios para niños.",
        target: "Good afternoon. This project is very important for our community. We want to make sure the design includes green areas and spaces for children.",
    },
    Entry {
        from: "es-ES",
        to: "en-US",
        source: "Perfecto. También necesitamos considerar el mantenimiento a largo plazo. ¿Cuál es el presupuesto anual propuesto?",
        target: "Perfect. We also need to consider long-term maintenance. What is the proposed annual budget?",
    },
    Entry {
        from: "es-ES",
        to: "en-US",
        source: "¿Cuándo planeamos comenzar la construcción? La comunidad está muy emocionada por este proyecto.",
        target: "When do we plan to start construction? The community is very excited about this project.",
    },
    Entry {
        from: "es-ES",
        to: "en-US",
        source: "Excelente. Propongo que votemos hoy para aprobar el presupuesto y podamos avanzar con el proyecto.",
        target: "Excellent. I propose that we vote today to approve the budget so we can move forward with the project.",
    },
];

/// Fixed-table translator for the scripted council meeting.
pub struct LookupTranslator {
    table: &'static [Entry],
}

impl LookupTranslator {
    pub fn council_meeting() -> Self {
        Self {
            table: COUNCIL_TABLE,
        }
    }
}

impl Translator for LookupTranslator {
    fn translate(&self, text: &str, from: &str, to: &str) -> String {
        self.table
            .iter()
            .find(|e| e.from == from && e.to == to && e.source == text)
            .map(|e| e.target.to_string())
            .unwrap_or_else(|| PLACEHOLDER.to_string())
    }

    fn counterpart(&self, language: &str) -> Option<&str> {
        match language {
            "en-US" => Some("es-ES"),
            "es-ES" => Some("en-US"),
            _ => None,
        }
    }
}
