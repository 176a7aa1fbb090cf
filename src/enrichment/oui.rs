//! OUI/manufacturer lookup: loads a tab-separated `prefix \t manufacturer`
//! file at startup and resolves a MAC address's first three octets to a
//! vendor name. Pure and infallible — malformed input yields `"Unknown"`.

use std::collections::HashMap;
use std::path::Path;

pub struct OuiTable {
    table: HashMap<String, String>,
}

impl OuiTable {
    /// Loads the table, skipping blank lines and `#`-comments. Tolerates a
    /// missing file by returning an empty table rather than failing startup.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let mut table = HashMap::new();
        let contents = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!("oui table not loaded from {}: {e}", path.display());
                return Self { table };
            }
        };
        for line in contents.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Some((prefix, manufacturer)) = line.split_once('\t') {
                table.insert(prefix.trim().to_uppercase(), manufacturer.trim().to_string());
            }
        }
        tracing::info!("oui table loaded: {} entries", table.len());
        Self { table }
    }

    pub fn empty() -> Self {
        Self {
            table: HashMap::new(),
        }
    }

    /// Normalizes the MAC to a canonical `AA:BB:CC` OUI prefix, accepting
    /// `:`, `-`, or `.` separators, and looks it up. Returns `"Unknown"` for
    /// anything that can't be reduced to three octets.
    pub fn lookup(&self, mac: &str) -> String {
        let Some(prefix) = normalize_oui_prefix(mac) else {
            return "Unknown".to_string();
        };
        self.table
            .get(&prefix)
            .cloned()
            .unwrap_or_else(|| "Unknown".to_string())
    }
}

fn normalize_oui_prefix(mac: &str) -> Option<String> {
    let cleaned: String = mac
        .trim()
        .to_uppercase()
        .chars()
        .map(|c| if c == '-' || c == '.' { ':' } else { c })
        .collect();

    let octets: Vec<&str> = cleaned.split(':').filter(|s| !s.is_empty()).collect();
    if octets.len() >= 3 && octets[..3].iter().all(|o| o.len() <= 2) {
        let prefix: Vec<String> = octets[..3]
            .iter()
            .map(|o| format!("{:0>2}", o))
            .collect();
        return Some(prefix.join(":"));
    }

    // Fallback: dotted or bare hex with no separators, e.g. "aabbcc.ddeeff".
    let hex_only: String = cleaned.chars().filter(|c| c.is_ascii_hexdigit()).collect();
    if hex_only.len() >= 6 {
        let bytes = &hex_only[..6];
        let prefix = format!(
            "{}:{}:{}",
            &bytes[0..2],
            &bytes[2..4],
            &bytes[4..6]
        );
        return Some(prefix);
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn table_with(entries: &[(&str, &str)]) -> OuiTable {
        let mut file = tempfile_path();
        {
            let mut f = std::fs::File::create(&file).unwrap();
            for (prefix, manufacturer) in entries {
                writeln!(f, "{prefix}\t{manufacturer}").unwrap();
            }
            writeln!(f, "# a comment").unwrap();
            writeln!(f).unwrap();
        }
        let table = OuiTable::load(&file);
        let _ = std::fs::remove_file(&mut file);
        table
    }

    fn tempfile_path() -> std::path::PathBuf {
        std::env::temp_dir().join(format!("nettap-oui-test-{}.txt", std::process::id()))
    }

    #[test]
    fn resolves_known_prefix_with_colon_mac() {
        let table = table_with(&[("AC:DE:48", "Apple, Inc.")]);
        assert_eq!(table.lookup("ac:de:48:12:34:56"), "Apple, Inc.");
    }

    #[test]
    fn resolves_with_dash_and_dot_separators() {
        let table = table_with(&[("AC:DE:48", "Apple, Inc.")]);
        assert_eq!(table.lookup("AC-DE-48-12-34-56"), "Apple, Inc.");
        assert_eq!(table.lookup("ACDE.4812.3456"), "Apple, Inc.");
    }

    #[test]
    fn unknown_for_unmapped_or_malformed() {
        let table = table_with(&[("AC:DE:48", "Apple, Inc.")]);
        assert_eq!(table.lookup("00:11:22:33:44:55"), "Unknown");
        assert_eq!(table.lookup("garbage"), "Unknown");
        assert_eq!(table.lookup(""), "Unknown");
    }

    #[test]
    fn missing_file_yields_empty_table_not_failure() {
        let table = OuiTable::load("/nonexistent/path/oui.txt");
        assert_eq!(table.lookup("AC:DE:48:00:00:00"), "Unknown");
    }
}
