//! User-facing Nepali strings.

pub const UNSUPPORTED_FORMAT: &str = "कृपया फोटो वा PDF फाइल छान्नुहोस्";
pub const EMPTY_EXTRACTION: &str = "कागजातबाट पाठ निकाल्न सकिएन";
pub const DOCUMENT_FAILED: &str = "कागजात प्रक्रिया गर्न सकिएन";
pub const DOCUMENT_DONE: &str = "कागजात विश्लेषण सम्पन्न!";
pub const ANALYSIS_FAILED_SUMMARY: &str = "कागजात विश्लेषण गर्न सकिएन।";

pub const RATE_LIMITED: &str = "धेरै अनुरोधहरू। कृपया केही समय पछि पुन: प्रयास गर्नुहोस्।";
pub const RATE_LIMITED_SHORT: &str = "धेरै अनुरोधहरू।";
pub const CREDIT_REQUIRED: &str = "क्रेडिट आवश्यक छ।";
pub const UNKNOWN_ERROR: &str = "अज्ञात त्रुटि भयो";

pub const CHAT_APOLOGY: &str = "माफ गर्नुहोला, केही समस्या भयो। कृपया पुन: प्रयास गर्नुहोस्।";
pub const CHAT_NO_INFORMATION: &str = "माफ गर्नुहोला, यस विषयमा पर्याप्त कानुनी जानकारी उपलब्ध छैन।";
pub const CHAT_CREATE_FAILED: &str = "च्याट बनाउन सकिएन";
pub const CHAT_SEND_FAILED: &str = "सन्देश पठाउन सकिएन";

pub const TRANSLATE_FAILED: &str = "अनुवाद गर्न सकिएन।";
pub const SPEECH_FAILED: &str = "भ्वाइस पहिचान गर्न सकिएन";
pub const SAVE_FAILED: &str = "बचत गर्न सकिएन";
pub const SIGN_IN_REQUIRED: &str = "कृपया पहिले लग इन गर्नुहोस्";
pub const NOT_FOUND: &str = "फेला परेन";
