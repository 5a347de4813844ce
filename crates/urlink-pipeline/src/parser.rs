use urlink_frame::{ParseError, RawFrame};

/// Decodes one deframed package into typed values.
///
/// Implementations are stateless: the same frame always yields the same
/// result. One frame may carry several packages (e.g. a robot state frame
/// with several sub-packages).
pub trait Parser: Send + 'static {
    type Package: Send + 'static;

    fn parse(&self, frame: &RawFrame) -> Result<Parsed<Self::Package>, ParseError>;
}

/// Outcome of parsing a well-formed frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Parsed<P> {
    /// The frame decoded into these packages, in wire order.
    Packages(Vec<P>),
    /// The discriminator is not known to this parser. The frame is consumed
    /// as a whole.
    UnknownType,
}

/// What the producer places on the ingestion queue.
#[derive(Debug, Clone, PartialEq)]
pub enum Event<P> {
    /// A decoded package.
    Package(P),
    /// A frame with an unrecognised discriminator was skipped.
    UnknownPackageType { package_type: u8, length: usize },
}
