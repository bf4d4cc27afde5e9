//! Static university registry: where each listing lives and how the browser
//! must present itself there.

use progscan_engine::Visibility;

pub struct UniversityConfig {
    /// Short key used on the command line and in output filenames.
    pub key: &'static str,
    /// Stable university code stamped onto records.
    pub code: &'static str,
    pub name: &'static str,
    pub base_url: &'static str,
    pub list_url: &'static str,
    /// Default browser visibility for this site. Sites behind a WAF that
    /// rejects headless Chrome run headful.
    pub visibility: Visibility,
}

pub const UNIVERSITIES: &[UniversityConfig] = &[
    UniversityConfig {
        key: "hku",
        code: "HK001",
        name: "The University of Hong Kong",
        base_url: "https://portal.hku.hk",
        list_url: "https://portal.hku.hk/tpg-admissions/programme-listing",
        visibility: Visibility::Headless,
    },
    UniversityConfig {
        key: "cityu",
        code: "HK003",
        name: "City University of Hong Kong",
        base_url: "https://www.cityu.edu.hk",
        list_url: "https://www.cityu.edu.hk/pg/taught-postgraduate-programmes/list",
        // The listing sits behind a WAF that blocks headless sessions.
        visibility: Visibility::Headful,
    },
];

pub fn find(key: &str) -> Option<&'static UniversityConfig> {
    UNIVERSITIES.iter().find(|u| u.key == key)
}
