/// Default asset locations for a challenge type whose descriptor does not name
/// its own view or controller script.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TypeConvention {
    pub name: &'static str,
    pub view: &'static str,
    pub script: &'static str,
}

pub const CONVENTIONS_VERSION: u16 = 1;

pub const TYPE_STANDARD: &str = "standard";
pub const TYPE_DYNAMIC: &str = "dynamic";

pub const TEMPLATE_EXTENSIONS: [&str; 2] = [".html", ".htm"];
pub const SCRIPT_EXTENSION: &str = ".js";

pub const CONVENTIONS: [TypeConvention; 2] = [
    TypeConvention {
        name: TYPE_STANDARD,
        view: "/plugins/challenges/assets/view.html",
        script: "/plugins/challenges/assets/view.js",
    },
    TypeConvention {
        name: TYPE_DYNAMIC,
        view: "/plugins/dynamic_challenges/assets/view.html",
        script: "/plugins/dynamic_challenges/assets/view.js",
    },
];

pub const CONVENTION_COUNT: usize = CONVENTIONS.len();

fn conventions_by_type()
-> &'static std::collections::HashMap<&'static str, &'static TypeConvention> {
    static LOOKUP: std::sync::OnceLock<
        std::collections::HashMap<&'static str, &'static TypeConvention>,
    > = std::sync::OnceLock::new();
    LOOKUP.get_or_init(|| {
        let mut map = std::collections::HashMap::with_capacity(CONVENTIONS.len());
        for convention in CONVENTIONS.iter() {
            map.insert(convention.name, convention);
        }
        map
    })
}

pub fn convention_by_type(challenge_type: &str) -> Option<&'static TypeConvention> {
    conventions_by_type().get(challenge_type).copied()
}

/// Strips a trailing template extension from `path`, returning the stem.
pub fn template_stem(path: &str) -> Option<&str> {
    TEMPLATE_EXTENSIONS
        .iter()
        .find_map(|extension| path.strip_suffix(extension))
        .filter(|stem| !stem.is_empty())
}

pub fn conventions_json() -> &'static str {
    include_str!("../conventions.json")
}
