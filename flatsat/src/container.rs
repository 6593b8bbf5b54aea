//! Framed files and streams holding one serialized value.
//!
//! A container starts with the magic bytes `FSAT`, followed by the format version and the kind of
//! the body. After the body an end marker is written, so truncated files are detected even when
//! the truncation happens to fall on a record boundary.
//!
//! Containers can be gzip compressed. Readers detect compression by the gzip magic bytes, so the
//! caller does not need to know how a container was written.
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;

use flate2::{read::GzDecoder, write::GzEncoder, Compression};
use log::info;

use flatsat_formula::{Formula, FormulaFactory};
use flatsat_internal_codec::{read_u64, write_u64, CodecError};

use crate::error::SerialError;
use crate::graph::{self, read_graph, write_graph, ExpressionGraph};
use crate::payload::PayloadRegistry;
use crate::pool::{
    deserialize_snapshot, read_snapshot, serialize_snapshot, write_snapshot, SerializedSnapshot,
};
use crate::proposition::{
    deserialize_propositions, read_propositions, serialize_propositions, write_propositions,
    Proposition, SerializedPropositions,
};
use crate::snapshot::EngineSnapshot;

/// First bytes of every uncompressed container.
pub const MAGIC: &[u8; 4] = b"FSAT";

/// Version of the body encoding. Containers of other versions are rejected.
pub const FORMAT_VERSION: u64 = 1;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

// Random value unlikely to be the result of a truncated body.
const CODE_END: u64 = 0x9ac3391f4294c211;

flatsat_internal_codec::tag_codes!(0, KIND_FORMULAS, KIND_PROPOSITIONS, KIND_SNAPSHOT,);

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum ContainerKind {
    Formulas,
    Propositions,
    Snapshot,
}

impl ContainerKind {
    pub fn name(self) -> &'static str {
        match self {
            ContainerKind::Formulas => "formulas",
            ContainerKind::Propositions => "propositions",
            ContainerKind::Snapshot => "engine snapshot",
        }
    }
}

/// Body of a container.
#[derive(Clone, PartialEq, Debug)]
pub enum Container {
    Formulas(ExpressionGraph),
    Propositions(SerializedPropositions),
    Snapshot(SerializedSnapshot),
}

impl Container {
    pub fn from_formulas(formulas: &[Formula]) -> Container {
        Container::Formulas(graph::serialize(formulas))
    }

    pub fn from_propositions(propositions: &[Proposition]) -> Container {
        Container::Propositions(serialize_propositions(propositions))
    }

    pub fn from_snapshot(engine: &EngineSnapshot) -> Result<Container, SerialError> {
        Ok(Container::Snapshot(serialize_snapshot(engine)?))
    }

    pub fn kind(&self) -> ContainerKind {
        match self {
            Container::Formulas(_) => ContainerKind::Formulas,
            Container::Propositions(_) => ContainerKind::Propositions,
            Container::Snapshot(_) => ContainerKind::Snapshot,
        }
    }

    fn expected(&self, kind: ContainerKind) -> SerialError {
        SerialError::malformed(format!(
            "expected a {} container, found {}",
            kind.name(),
            self.kind().name()
        ))
    }

    /// Restores the formulas of a formulas container.
    pub fn formulas(&self, factory: &mut FormulaFactory) -> Result<Vec<Formula>, SerialError> {
        match self {
            Container::Formulas(graph) => graph::deserialize(factory, graph),
            _ => Err(self.expected(ContainerKind::Formulas)),
        }
    }

    /// Restores the propositions of a propositions container.
    pub fn propositions(
        &self,
        registry: &PayloadRegistry,
        factory: &mut FormulaFactory,
    ) -> Result<Vec<Proposition>, SerialError> {
        match self {
            Container::Propositions(propositions) => {
                deserialize_propositions(propositions, registry, factory)
            }
            _ => Err(self.expected(ContainerKind::Propositions)),
        }
    }

    /// Restores the engine of a snapshot container.
    pub fn snapshot(
        &self,
        registry: &PayloadRegistry,
        factory: &mut FormulaFactory,
    ) -> Result<EngineSnapshot, SerialError> {
        match self {
            Container::Snapshot(snapshot) => deserialize_snapshot(snapshot, registry, factory),
            _ => Err(self.expected(ContainerKind::Snapshot)),
        }
    }
}

/// Writes an uncompressed container.
pub fn write_container(target: &mut impl Write, container: &Container) -> io::Result<()> {
    target.write_all(MAGIC)?;
    write_u64(&mut *target, FORMAT_VERSION)?;
    match container {
        Container::Formulas(graph) => {
            write_u64(&mut *target, KIND_FORMULAS)?;
            write_graph(&mut *target, graph)?;
        }
        Container::Propositions(propositions) => {
            write_u64(&mut *target, KIND_PROPOSITIONS)?;
            write_propositions(&mut *target, propositions)?;
        }
        Container::Snapshot(snapshot) => {
            write_u64(&mut *target, KIND_SNAPSHOT)?;
            write_snapshot(&mut *target, snapshot)?;
        }
    }
    write_u64(&mut *target, CODE_END)
}

/// Reads an uncompressed container.
pub fn read_container(source: &mut impl BufRead) -> Result<Container, SerialError> {
    let mut magic = [0; 4];
    source.read_exact(&mut magic).map_err(CodecError::from)?;
    if &magic != MAGIC {
        return Err(SerialError::malformed("not a flatsat container"));
    }

    let version = read_u64(&mut *source)?;
    if version != FORMAT_VERSION {
        return Err(SerialError::malformed(format!(
            "unsupported format version {}",
            version
        )));
    }

    let container = match read_u64(&mut *source)? {
        KIND_FORMULAS => Container::Formulas(read_graph(&mut *source)?),
        KIND_PROPOSITIONS => Container::Propositions(read_propositions(&mut *source)?),
        KIND_SNAPSHOT => Container::Snapshot(read_snapshot(&mut *source)?),
        kind => {
            return Err(SerialError::malformed(format!(
                "unknown container kind {}",
                kind
            )))
        }
    };

    if read_u64(&mut *source)? != CODE_END {
        return Err(SerialError::malformed("missing end marker"));
    }
    if !source.fill_buf()?.is_empty() {
        return Err(SerialError::malformed("trailing data after end marker"));
    }

    Ok(container)
}

/// Writes a container to a stream, optionally gzip compressed.
pub fn write_to_stream(
    target: impl Write,
    container: &Container,
    compress: bool,
) -> Result<(), SerialError> {
    let mut target = BufWriter::new(target);
    if compress {
        let mut encoder = GzEncoder::new(target, Compression::default());
        write_container(&mut encoder, container)?;
        encoder.finish()?.flush()?;
    } else {
        write_container(&mut target, container)?;
        target.flush()?;
    }
    Ok(())
}

/// Reads a possibly compressed container from a stream.
pub fn read_from_stream(source: impl Read) -> Result<Container, SerialError> {
    let mut source = BufReader::new(source);
    if source.fill_buf()?.starts_with(&GZIP_MAGIC) {
        read_container(&mut BufReader::new(GzDecoder::new(source)))
    } else {
        read_container(&mut source)
    }
}

/// Writes a container file, replacing any existing file.
pub fn write_file(
    path: impl AsRef<Path>,
    container: &Container,
    compress: bool,
) -> Result<(), SerialError> {
    let path = path.as_ref();
    write_to_stream(File::create(path)?, container, compress)?;
    info!(
        "Wrote {} container to {}{}",
        container.kind().name(),
        path.display(),
        if compress { " (compressed)" } else { "" }
    );
    Ok(())
}

/// Reads a possibly compressed container file.
pub fn read_file(path: impl AsRef<Path>) -> Result<Container, SerialError> {
    let path = path.as_ref();
    let container = read_from_stream(File::open(path)?)?;
    info!(
        "Read {} container from {}",
        container.kind().name(),
        path.display()
    );
    Ok(container)
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::config::SolverConfig;

    fn formulas_container() -> (FormulaFactory, Vec<Formula>, Container) {
        let mut f = FormulaFactory::caching();
        let x = f.variable("x");
        let y = f.variable("y");
        let imp = f.implication(x.clone(), y);
        let not_x = f.not(x);
        let formulas = vec![imp, not_x];
        let container = Container::from_formulas(&formulas);
        (f, formulas, container)
    }

    #[test]
    fn framed_round_trip() {
        let (mut f, formulas, container) = formulas_container();

        let mut buf = vec![];
        write_container(&mut buf, &container).unwrap();
        assert!(buf.starts_with(MAGIC));

        let read = read_container(&mut &buf[..]).unwrap();
        assert_eq!(read, container);
        assert_eq!(read.formulas(&mut f).unwrap(), formulas);
    }

    #[test]
    fn compression_is_detected() {
        let (_, _, container) = formulas_container();

        let mut plain = vec![];
        write_to_stream(&mut plain, &container, false).unwrap();
        let mut compressed = vec![];
        write_to_stream(&mut compressed, &container, true).unwrap();

        assert!(compressed.starts_with(&GZIP_MAGIC));
        assert_eq!(read_from_stream(&plain[..]).unwrap(), container);
        assert_eq!(read_from_stream(&compressed[..]).unwrap(), container);
    }

    #[test]
    fn truncation_is_malformed() {
        let (_, _, container) = formulas_container();
        let mut buf = vec![];
        write_container(&mut buf, &container).unwrap();

        for len in 0..buf.len() {
            match read_container(&mut &buf[..len]) {
                Err(SerialError::MalformedContainer(_)) => (),
                other => panic!("unexpected result {:?} for length {}", other, len),
            }
        }
    }

    #[test]
    fn wrong_magic_and_version() {
        let (_, _, container) = formulas_container();
        let mut buf = vec![];
        write_container(&mut buf, &container).unwrap();

        let mut bad_magic = buf.clone();
        bad_magic[0] = b'X';
        assert!(read_container(&mut &bad_magic[..]).is_err());

        let mut bad_version = buf.clone();
        // version 2
        bad_version[4] = 5;
        match read_container(&mut &bad_version[..]) {
            Err(SerialError::MalformedContainer(CodecError::Invalid(message))) => {
                assert!(message.contains("version"))
            }
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn kind_mismatch() {
        let (mut f, _, container) = formulas_container();
        assert_eq!(container.kind(), ContainerKind::Formulas);

        let registry = PayloadRegistry::new();
        assert!(container.snapshot(&registry, &mut f).is_err());
        assert!(container.propositions(&registry, &mut f).is_err());
    }

    #[test]
    fn snapshot_file() {
        let mut engine = EngineSnapshot::new(SolverConfig::default());
        engine.new_var(Some("a"));
        engine.new_var(Some("b"));
        let container = Container::from_snapshot(&engine).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.fsat.gz");
        write_file(&path, &container, true).unwrap();

        let read = read_file(&path).unwrap();
        assert_eq!(read, container);
        let restored = read
            .snapshot(&PayloadRegistry::new(), &mut FormulaFactory::caching())
            .unwrap();
        assert_eq!(restored.names.len(), 2);
    }
}
