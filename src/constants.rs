use once_cell::sync::Lazy;
use regex::Regex;

pub const DEFAULT_PAGE_SIZE: i64 = 6;
pub const MAX_PAGE_SIZE: i64 = 100;

pub const EMAIL_MAX_LENGTH: usize = 254;
pub const USER_FIELD_MAX_LENGTH: usize = 150;
pub const NAME_MAX_LENGTH: usize = 200;
pub const DEFAULT_TAG_COLOR: &str = "#ffffff";

pub const MIN_COOKING_TIME: i64 = 1;
pub const MIN_INGREDIENT_AMOUNT: i64 = 1;

pub const IMAGE_UPLOAD_DIR: &str = "recipes/images";
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp", "bmp"];

pub const SHOPPING_LIST_FILENAME: &str = "shopping_list.txt";

pub const TOKEN_PREFIXES: &[&str] = &["Token ", "Bearer "];

pub static USERNAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[\w.@+-]+$").expect("valid username regex"));
pub static SLUG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[-a-zA-Z0-9_]+$").expect("valid slug regex"));
pub static COLOR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^#[0-9a-fA-F]{6}$").expect("valid color regex"));
pub static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid email regex"));
