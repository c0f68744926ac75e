//! Footnote label sequences

/// How a footnote scope numbers its footnotes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LabelScheme {
    /// a, b, ..., z, aa, ab, ... (body footnotes)
    Alphabetic,

    /// 1, 2, 3, ... (table footnotes)
    Numeric,
}

impl LabelScheme {
    /// Label of the `n`th footnote, counting from 1
    pub fn label(self, n: usize) -> String {
        match self {
            LabelScheme::Alphabetic => alphabetic_label(n),
            LabelScheme::Numeric => n.to_string(),
        }
    }

    pub fn sequence(self) -> LabelSequence {
        LabelSequence {
            scheme: self,
            issued: 0,
        }
    }
}

/// Bijective base-26: 1 → a, 26 → z, 27 → aa, 703 → aaa
pub fn alphabetic_label(n: usize) -> String {
    let mut n = n;
    let mut out = Vec::new();
    while n > 0 {
        n -= 1;
        out.push(b'a' + (n % 26) as u8);
        n /= 26;
    }
    out.reverse();
    String::from_utf8_lossy(&out).into_owned()
}

/// Hands out labels in order
#[derive(Debug, Clone)]
pub struct LabelSequence {
    scheme: LabelScheme,
    issued: usize,
}

impl Iterator for LabelSequence {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        self.issued += 1;
        Some(self.scheme.label(self.issued))
    }
}
