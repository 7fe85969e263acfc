//! Stored file names.

use chrono::NaiveTime;
use uuid::Uuid;

/// How an accepted file is renamed before it is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileNaming {
    /// Replace the name with a random id.
    pub unique: bool,
    /// Replace the name with an ASCII slug of itself.
    pub translit: bool,
}

impl Default for FileNaming {
    fn default() -> Self {
        Self {
            unique: true,
            translit: false,
        }
    }
}

impl FileNaming {
    /// Name for a file uploaded as `original` with the given `extension`.
    ///
    /// Renamed files are `HHMMSS_<id or slug>.<ext>`. Files without an
    /// extension keep their original name.
    pub fn file_name(&self, original: &str, base_name: &str, extension: &str, time: NaiveTime) -> String {
        if extension.is_empty() || !(self.unique || self.translit) {
            return original.to_owned();
        }

        let stem = if self.unique {
            Uuid::new_v4().simple().to_string()
        } else {
            let slug = slugify(base_name);
            if slug.is_empty() {
                Uuid::new_v4().simple().to_string()
            } else {
                slug
            }
        };
        format!("{}_{stem}.{extension}", time.format("%H%M%S"))
    }
}

/// Lowercase ASCII slug: accents folded, every other run of
/// non-alphanumerics collapsed to a single `-`.
pub fn slugify(raw: &str) -> String {
    let mut slug = String::with_capacity(raw.len());
    let mut pending_dash = false;

    for c in raw.chars() {
        let folded = fold(c);
        let mut produced = false;
        for f in folded.chars() {
            if f.is_ascii_alphanumeric() {
                if pending_dash && !slug.is_empty() {
                    slug.push('-');
                }
                pending_dash = false;
                slug.push(f.to_ascii_lowercase());
                produced = true;
            }
        }
        if !produced {
            pending_dash = true;
        }
    }
    slug
}

fn fold(c: char) -> String {
    let ascii = match c {
        'À' | 'Á' | 'Â' | 'Ã' | 'Ä' | 'Å' | 'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' | 'ā' | 'ă' | 'ą' => "a",
        'Æ' | 'æ' => "ae",
        'Ç' | 'ç' | 'ć' | 'č' => "c",
        'Ď' | 'ď' | 'đ' | 'Ð' | 'ð' => "d",
        'È' | 'É' | 'Ê' | 'Ë' | 'è' | 'é' | 'ê' | 'ë' | 'ē' | 'ė' | 'ę' | 'ě' => "e",
        'ğ' | 'ģ' => "g",
        'Ì' | 'Í' | 'Î' | 'Ï' | 'ì' | 'í' | 'î' | 'ï' | 'ī' | 'į' | 'ı' => "i",
        'ķ' => "k",
        'Ł' | 'ł' | 'ļ' | 'ľ' => "l",
        'Ñ' | 'ñ' | 'ń' | 'ň' | 'ņ' => "n",
        'Ò' | 'Ó' | 'Ô' | 'Õ' | 'Ö' | 'Ø' | 'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' | 'ō' | 'ő' => "o",
        'Œ' | 'œ' => "oe",
        'ř' | 'ŕ' => "r",
        'Ś' | 'Š' | 'ś' | 'š' | 'ş' | 'ș' => "s",
        'ß' => "ss",
        'ť' | 'ţ' | 'ț' => "t",
        'Þ' | 'þ' => "th",
        'Ù' | 'Ú' | 'Û' | 'Ü' | 'ù' | 'ú' | 'û' | 'ü' | 'ū' | 'ů' | 'ű' | 'ų' => "u",
        'Ý' | 'ý' | 'ÿ' => "y",
        'Ź' | 'Ż' | 'Ž' | 'ź' | 'ż' | 'ž' => "z",
        _ => return c.to_string(),
    };
    ascii.to_owned()
}
