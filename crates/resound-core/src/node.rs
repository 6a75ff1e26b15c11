//! Audio node type tags.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Type tag of a virtual node.
///
/// The builtin variants form the closed enumeration of node types a host
/// audio API is expected to construct. Any other tag is carried verbatim in
/// [`NodeType::Other`] so it can be matched against custom registrations or
/// degraded to a pass-through at creation time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum NodeType {
    Analyser,
    BufferSource,
    Destination,
    BiquadFilter,
    ChannelMerger,
    ChannelSplitter,
    ConstantSource,
    Convolver,
    Delay,
    DynamicsCompressor,
    Gain,
    IirFilter,
    MediaElementSource,
    MediaStreamSource,
    MediaStreamDestination,
    Oscillator,
    Panner,
    StereoPanner,
    WaveShaper,
    /// A tag outside the builtin enumeration
    Other(String),
}

/// (variant, canonical tag, short alias)
const BUILTIN_TAGS: &[(NodeType, &str, &str)] = &[
    (NodeType::Analyser, "AnalyserNode", "analyser"),
    (NodeType::BufferSource, "AudioBufferSourceNode", "bufferSource"),
    (NodeType::Destination, "AudioDestinationNode", "destination"),
    (NodeType::BiquadFilter, "BiquadFilterNode", "biquadFilter"),
    (NodeType::ChannelMerger, "ChannelMergerNode", "channelMerger"),
    (NodeType::ChannelSplitter, "ChannelSplitterNode", "channelSplitter"),
    (NodeType::ConstantSource, "ConstantSourceNode", "constantSource"),
    (NodeType::Convolver, "ConvolverNode", "convolver"),
    (NodeType::Delay, "DelayNode", "delay"),
    (NodeType::DynamicsCompressor, "DynamicsCompressorNode", "dynamicsCompressor"),
    (NodeType::Gain, "GainNode", "gain"),
    (NodeType::IirFilter, "IIRFilterNode", "iirFilter"),
    (NodeType::MediaElementSource, "MediaElementAudioSourceNode", "mediaElementSource"),
    (NodeType::MediaStreamSource, "MediaStreamAudioSourceNode", "mediaStreamSource"),
    (NodeType::MediaStreamDestination, "MediaStreamAudioDestinationNode", "mediaStreamDestination"),
    (NodeType::Oscillator, "OscillatorNode", "oscillator"),
    (NodeType::Panner, "PannerNode", "panner"),
    (NodeType::StereoPanner, "StereoPannerNode", "stereoPanner"),
    (NodeType::WaveShaper, "WaveShaperNode", "waveShaper"),
];

impl NodeType {
    /// All builtin node types, in declaration order.
    pub fn builtins() -> impl Iterator<Item = NodeType> {
        BUILTIN_TAGS.iter().map(|(ty, _, _)| ty.clone())
    }

    /// Parse a wire tag. Both the canonical class name and the short alias
    /// are accepted; anything else becomes [`NodeType::Other`].
    #[must_use]
    pub fn from_tag(tag: &str) -> Self {
        BUILTIN_TAGS
            .iter()
            .find(|(_, canonical, alias)| *canonical == tag || *alias == tag)
            .map_or_else(|| Self::Other(tag.to_string()), |(ty, _, _)| ty.clone())
    }

    /// Canonical wire tag.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Other(tag) => tag.as_str(),
            builtin => BUILTIN_TAGS
                .iter()
                .find(|(ty, _, _)| ty == builtin)
                .map_or("", |(_, canonical, _)| *canonical),
        }
    }

    /// Whether this tag belongs to the builtin enumeration.
    #[must_use]
    pub fn is_builtin(&self) -> bool {
        !matches!(self, Self::Other(_))
    }
}

impl From<String> for NodeType {
    fn from(tag: String) -> Self {
        Self::from_tag(&tag)
    }
}

impl From<&str> for NodeType {
    fn from(tag: &str) -> Self {
        Self::from_tag(tag)
    }
}

impl From<NodeType> for String {
    fn from(ty: NodeType) -> Self {
        ty.as_str().to_string()
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
