use std::{error::Error, fmt, fs, hash::Hash, io, path::Path};

use lr1grammar::{Grammar, RIdx, TIdx};
use lr1table::{StateTable, StateTableError};
use num_traits::{AsPrimitive, PrimInt, Unsigned};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

/// The version of the on-disk table format. Artifacts are prefixed with this number and
/// artifacts with any other version are rejected when read.
pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug)]
pub enum ArtifactError {
    Io(io::Error),
    Encoding(bincode::Error),
    /// The artifact was written with a different format version.
    Version(u32),
    /// The state table is internally inconsistent.
    Table(StateTableError),
    /// The token or rule names do not match the state table.
    Names,
}

impl Error for ArtifactError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ArtifactError::Io(e) => Some(e),
            ArtifactError::Encoding(e) => Some(e),
            ArtifactError::Table(e) => Some(e),
            ArtifactError::Version(_) | ArtifactError::Names => None,
        }
    }
}

impl fmt::Display for ArtifactError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ArtifactError::Io(e) => write!(f, "{}", e),
            ArtifactError::Encoding(e) => write!(f, "Malformed table artifact: {}", e),
            ArtifactError::Version(v) => write!(
                f,
                "Table artifact has format version {} (expected {})",
                v, FORMAT_VERSION
            ),
            ArtifactError::Table(e) => write!(f, "Malformed table artifact: {}", e),
            ArtifactError::Names => write!(
                f,
                "Malformed table artifact: names do not match the state table"
            ),
        }
    }
}

impl From<io::Error> for ArtifactError {
    fn from(err: io::Error) -> Self {
        ArtifactError::Io(err)
    }
}

impl From<StateTableError> for ArtifactError {
    fn from(err: StateTableError) -> Self {
        ArtifactError::Table(err)
    }
}

impl From<bincode::Error> for ArtifactError {
    fn from(err: bincode::Error) -> Self {
        ArtifactError::Encoding(err)
    }
}

/// Everything a parser needs at run-time: a state table plus enough of its grammar to map
/// between token names and indices and to report rule names.
#[derive(Debug, Serialize, Deserialize)]
pub struct TableArtifact<StorageT: Eq + Hash> {
    token_names: Vec<String>,
    rule_names: Vec<String>,
    eof_token_idx: TIdx<StorageT>,
    start_rule_idx: RIdx<StorageT>,
    stable: StateTable<StorageT>,
}

impl<StorageT> TableArtifact<StorageT>
where
    StorageT: 'static + Hash + PrimInt + Unsigned + Serialize + DeserializeOwned,
    usize: AsPrimitive<StorageT>,
{
    /// Bundle `stable`, which must have been built from `grm`, with `grm`'s names.
    pub fn new(grm: &Grammar<StorageT>, stable: StateTable<StorageT>) -> Self {
        TableArtifact {
            token_names: grm
                .iter_tidxs()
                .map(|t| grm.token_name(t).to_owned())
                .collect(),
            rule_names: grm
                .iter_rules()
                .map(|r| grm.rule_name_str(r).to_owned())
                .collect(),
            eof_token_idx: grm.eof_token_idx(),
            start_rule_idx: grm.start_rule_idx(),
            stable,
        }
    }

    pub fn stable(&self) -> &StateTable<StorageT> {
        &self.stable
    }

    pub fn eof_token_idx(&self) -> TIdx<StorageT> {
        self.eof_token_idx
    }

    pub fn start_rule_idx(&self) -> RIdx<StorageT> {
        self.start_rule_idx
    }

    /// Return the name of token `tidx`. Panics if `tidx` doesn't exist.
    pub fn token_name(&self, tidx: TIdx<StorageT>) -> &str {
        &self.token_names[usize::from(tidx)]
    }

    /// Map a token name to its index.
    pub fn token_idx(&self, n: &str) -> Option<TIdx<StorageT>> {
        self.token_names
            .iter()
            .position(|x| x == n)
            .map(|i| TIdx(i.as_()))
    }

    /// Return the name of rule `ridx`. Panics if `ridx` doesn't exist.
    pub fn rule_name(&self, ridx: RIdx<StorageT>) -> &str {
        &self.rule_names[usize::from(ridx)]
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, ArtifactError> {
        let mut buf = bincode::serialize(&FORMAT_VERSION)?;
        bincode::serialize_into(&mut buf, self)?;
        Ok(buf)
    }

    pub fn from_bytes(mut bytes: &[u8]) -> Result<Self, ArtifactError> {
        let version: u32 = bincode::deserialize_from(&mut bytes)?;
        if version != FORMAT_VERSION {
            return Err(ArtifactError::Version(version));
        }
        let art: Self = bincode::deserialize_from(&mut bytes)?;
        art.validate()?;
        Ok(art)
    }

    fn validate(&self) -> Result<(), ArtifactError> {
        self.stable.validate()?;
        if self.token_names.len() != usize::from(self.stable.tokens_len())
            || self.rule_names.len() != usize::from(self.stable.rules_len())
            || self.eof_token_idx >= self.stable.tokens_len()
            || self.start_rule_idx >= self.stable.rules_len()
        {
            return Err(ArtifactError::Names);
        }
        Ok(())
    }

    pub fn write(&self, path: &Path) -> Result<(), ArtifactError> {
        fs::write(path, self.to_bytes()?)?;
        Ok(())
    }

    pub fn read(path: &Path) -> Result<Self, ArtifactError> {
        TableArtifact::from_bytes(&fs::read(path)?)
    }
}

#[cfg(test)]
mod test {
    use super::{ArtifactError, TableArtifact, FORMAT_VERSION};
    use lr1grammar::{Grammar, RIdx};
    use lr1table::{from_grammar, Options};

    fn artifact() -> TableArtifact<u32> {
        let grm = Grammar::new("t_eof\nt_a\n\nS > A\nA > t_a\n").unwrap();
        let (_, st) = from_grammar(&grm, Options::default());
        TableArtifact::new(&grm, st)
    }

    #[test]
    fn test_names() {
        let a = artifact();
        assert_eq!(a.token_name(a.eof_token_idx()), "t_eof");
        assert_eq!(a.token_idx("t_a").map(usize::from), Some(1));
        assert_eq!(a.token_idx("t_b"), None);
        assert_eq!(a.rule_name(a.start_rule_idx()), "S");
    }

    #[test]
    fn test_version_mismatch() {
        let mut bytes = artifact().to_bytes().unwrap();
        bytes[..4].copy_from_slice(&(FORMAT_VERSION + 1).to_le_bytes());
        match TableArtifact::<u32>::from_bytes(&bytes) {
            Err(ArtifactError::Version(v)) => assert_eq!(v, FORMAT_VERSION + 1),
            r => panic!("{:?}", r.map(|_| ())),
        }
    }

    #[test]
    fn test_names_mismatch() {
        let mut a = artifact();
        a.token_names.pop();
        let bytes = a.to_bytes().unwrap();
        assert!(matches!(
            TableArtifact::<u32>::from_bytes(&bytes),
            Err(ArtifactError::Names)
        ));

        let mut a = artifact();
        a.start_rule_idx = RIdx(2);
        let bytes = a.to_bytes().unwrap();
        let e = TableArtifact::<u32>::from_bytes(&bytes).unwrap_err();
        assert_eq!(
            e.to_string(),
            "Malformed table artifact: names do not match the state table"
        );
    }

    #[test]
    fn test_table_mismatch() {
        // A table built from a different grammar than the names came from.
        let grm = Grammar::new("t_eof\nt_a\n\nS > A\nA > t_a\n").unwrap();
        let other = Grammar::new("t_eof\nt_a\nt_b\n\nS > t_a t_b\n").unwrap();
        let (_, st) = from_grammar(&other, Options::default());
        let bytes = TableArtifact::new(&grm, st).to_bytes().unwrap();
        assert!(matches!(
            TableArtifact::<u32>::from_bytes(&bytes),
            Err(ArtifactError::Names)
        ));
    }

    #[test]
    fn test_truncated() {
        let bytes = artifact().to_bytes().unwrap();
        assert!(matches!(
            TableArtifact::<u32>::from_bytes(&bytes[..bytes.len() / 2]),
            Err(ArtifactError::Encoding(_))
        ));
    }
}
