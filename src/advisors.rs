//! Static directory of UAE labour-law advisors and worker safety rules.

use serde::Serialize;

#[derive(Debug, Clone, Copy)]
pub struct LegalAdvisor {
    pub name: &'static str,
    pub speciality: &'static str,
    pub whatsapp: &'static str,
    pub email: &'static str,
    /// Nepali description of the practice.
    pub info: &'static str,
}

impl LegalAdvisor {
    /// `wa.me` link built from the digits of the WhatsApp number.
    pub fn whatsapp_link(&self) -> String {
        let digits: String = self.whatsapp.chars().filter(|c| c.is_ascii_digit()).collect();
        format!("https://wa.me/{}", digits)
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct SafetyRule {
    pub title: &'static str,
    pub content: &'static str,
}

pub const LEGAL_ADVISORS: [LegalAdvisor; 3] = [
    LegalAdvisor {
        name: "LabourLawUAE Legal Consultants",
        speciality: "Employment & Labour Law in UAE",
        whatsapp: "+971501888453",
        email: "inquiry@labourlawuae.com",
        info: "ज्याला विवाद, करार समस्या, श्रम विवाद, भिसा समस्यामा अनुभवी टोली। दुबई र UAE मा सेवा।",
    },
    LegalAdvisor {
        name: "Al Menhali Advocates & Legal Consultancy",
        speciality: "Labour Law, Employment Disputes, Contract Defense",
        whatsapp: "+971504911142",
        email: "almenhali.lawyer@gmail.com",
        info: "रोजगार उल्लंघन, ज्याला दाबी, अन्यायपूर्ण बर्खास्ती, कार्यस्थल विवादमा कानुनी सहयोग। अबु धाबीमा।",
    },
    LegalAdvisor {
        name: "Al Kabban & Associates (Employee Rights Lawyers)",
        speciality: "Wage Claims, Unfair Termination, Labour Court",
        whatsapp: "+971505385138",
        email: "info@alkabban.com",
        info: "ज्याला दाबी, अन्यायपूर्ण बर्खास्ती, भेदभाव, श्रम अदालत प्रतिनिधित्व। UAE मा कर्मचारी अधिकार।",
    },
];

pub const SAFETY_RULES: [SafetyRule; 7] = [
    SafetyRule {
        title: "सधैं आफ्नो राहदानी आफैंसँग राख्नुहोस्",
        content: "नियोक्ता वा एजेन्सीले कानुनी रूपमा तपाईंको राहदानी राख्न सक्दैनन्। यदि कसैले तपाईंको सहमति बिना राख्छ भने, तुरुन्तै अधिकारीलाई सम्पर्क गर्नुहोस्।",
    },
    SafetyRule {
        title: "हस्ताक्षर गर्नुअघि आफ्नो करार बुझ्नुहोस्",
        content: "आफ्नो रोजगार करार ध्यानपूर्वक पढ्नुहोस्। तलब, भूमिका, काम गर्ने समय, सुविधा र बिदाका शर्तहरू वाचा गरिएकोसँग मिल्छ कि सुनिश्चित गर्नुहोस्। मौखिक वाचामा भर नपर्नुहोस्।",
    },
    SafetyRule {
        title: "वैध कार्य भिसा सुनिश्चित गर्नुहोस्",
        content: "सधैं सुनिश्चित गर्नुहोस् कि तपाईंसँग सही रोजगार भिसा छ (भिजिट भिसा होइन)। भिजिट भिसामा काम गर्नु गैरकानुनी हो र जरिवाना, हिरासत वा निष्कासन हुन सक्छ।",
    },
    SafetyRule {
        title: "सबै कागजातहरूको प्रतिलिपि राख्नुहोस्",
        content: "आफ्नो करार, प्रस्ताव पत्र, तलब स्लिप, भिसा/आईडी कागजातहरूको इलेक्ट्रोनिक र भौतिक प्रतिलिपि सुरक्षित राख्नुहोस्।",
    },
    SafetyRule {
        title: "पहिले आधिकारिक माध्यमबाट उजुरी गर्नुहोस्",
        content: "वकिललाई बढाउनुअघि MoHRE उजुरी वा दूतावास समर्थन जस्ता कानुनी प्रक्रियाहरू प्रयोग गर्नुहोस्। यसले लागत घटाउँछ र प्रायः समस्या छिटो समाधान गर्छ।",
    },
    SafetyRule {
        title: "अवैध भर्ती एजेन्टहरूबाट सावधान रहनुहोस्",
        content: "अत्यधिक शुल्क, अस्पष्ट कामको विवरण, वा अग्रिम नगद माग जस्ता चेतावनी संकेतहरूमा ध्यान दिनुहोस्।",
    },
    SafetyRule {
        title: "चाँडै कानुनी सहायता खोज्नुहोस्",
        content: "गम्भीर समस्या आउने बित्तिकै (ज्याला ढिलाइ, ज्याला कटौती, अन्यायपूर्ण बर्खास्ती, राहदानी होल्ड), प्रमाण सुरक्षित गर्न र वृद्धि रोक्न कानुनी सल्लाहकारसँग परामर्श गर्नुहोस्।",
    },
];

/// Serialized view of one advisor, links included.
#[derive(Debug, Serialize)]
pub struct AdvisorView {
    pub name: &'static str,
    pub speciality: &'static str,
    pub whatsapp: &'static str,
    pub whatsapp_link: String,
    pub email: &'static str,
    pub info: &'static str,
}

#[derive(Debug, Serialize)]
pub struct AdvisorDirectory {
    pub advisors: Vec<AdvisorView>,
    pub safety_rules: &'static [SafetyRule],
}

pub fn directory() -> AdvisorDirectory {
    AdvisorDirectory {
        advisors: LEGAL_ADVISORS
            .iter()
            .map(|a| AdvisorView {
                name: a.name,
                speciality: a.speciality,
                whatsapp: a.whatsapp,
                whatsapp_link: a.whatsapp_link(),
                email: a.email,
                info: a.info,
            })
            .collect(),
        safety_rules: &SAFETY_RULES,
    }
}
