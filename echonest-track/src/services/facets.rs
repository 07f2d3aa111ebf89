//! Analysis facets
//!
//! A facet is one independently fetchable piece of the analysis. Each facet
//! names its endpoint, knows where it lives in [`TrackAnalysis`], and parses
//! the `analysis` element of its response. The fetch/memoize protocol itself
//! lives in the accessor and is shared by all facets.

use roxmltree::Node;
use std::str::FromStr;

use crate::error::{AnalysisError, AnalysisResult};
use crate::models::{
    Estimate, KeyEstimate, Marker, Metadata, ModeEstimate, Section, Segment, SegmentLoudness,
    TempoEstimate, TimeSignatureEstimate, TrackAnalysis, SEGMENT_VECTOR_LEN,
};
use crate::services::envelope::{child, elements, nth_element, opt_child, parse_attr, parse_text, text};

/// One independently fetchable analysis result
pub trait Facet {
    /// Facet name used in logs
    const NAME: &'static str;
    /// Endpoint serving this facet, relative to the API base URL
    const ENDPOINT: &'static str;

    type Value: Clone + Send;

    /// Build the facet value from the response's `analysis` element
    fn parse(analysis: Node<'_, '_>) -> AnalysisResult<Self::Value>;

    /// Storage for this facet inside the aggregate
    fn slot(analysis: &mut TrackAnalysis) -> &mut Option<Self::Value>;

    fn peek(analysis: &TrackAnalysis) -> Option<&Self::Value>;

    /// Short description for status logging
    fn summary(value: &Self::Value) -> String;
}

macro_rules! facet_field {
    ($field:ident) => {
        fn slot(analysis: &mut TrackAnalysis) -> &mut Option<Self::Value> {
            &mut analysis.$field
        }

        fn peek(analysis: &TrackAnalysis) -> Option<&Self::Value> {
            analysis.$field.as_ref()
        }
    };
}

pub struct Bars;
pub struct Beats;
pub struct Tatums;
pub struct Sections;
pub struct Segments;
pub struct Duration;
pub struct EndOfFadeIn;
pub struct StartOfFadeOut;
pub struct Loudness;
pub struct Key;
pub struct Mode;
pub struct Tempo;
pub struct TimeSignature;
pub struct TrackMetadata;

impl Facet for Bars {
    const NAME: &'static str = "bars";
    const ENDPOINT: &'static str = "get_bars";
    type Value = Vec<Marker>;

    fn parse(analysis: Node<'_, '_>) -> AnalysisResult<Self::Value> {
        parse_markers(analysis)
    }

    facet_field!(bars);

    fn summary(value: &Self::Value) -> String {
        format!("{} bars", value.len())
    }
}

impl Facet for Beats {
    const NAME: &'static str = "beats";
    const ENDPOINT: &'static str = "get_beats";
    type Value = Vec<Marker>;

    fn parse(analysis: Node<'_, '_>) -> AnalysisResult<Self::Value> {
        parse_markers(analysis)
    }

    facet_field!(beats);

    fn summary(value: &Self::Value) -> String {
        format!("{} beats", value.len())
    }
}

impl Facet for Tatums {
    const NAME: &'static str = "tatums";
    const ENDPOINT: &'static str = "get_tatums";
    type Value = Vec<Marker>;

    fn parse(analysis: Node<'_, '_>) -> AnalysisResult<Self::Value> {
        parse_markers(analysis)
    }

    facet_field!(tatums);

    fn summary(value: &Self::Value) -> String {
        format!("{} tatums", value.len())
    }
}

impl Facet for Sections {
    const NAME: &'static str = "sections";
    const ENDPOINT: &'static str = "get_sections";
    type Value = Vec<Section>;

    fn parse(analysis: Node<'_, '_>) -> AnalysisResult<Self::Value> {
        elements(analysis)
            .map(|node| {
                Ok(Section {
                    start: parse_attr(node, "start")?,
                    duration: parse_attr(node, "duration")?,
                })
            })
            .collect()
    }

    facet_field!(sections);

    fn summary(value: &Self::Value) -> String {
        format!("{} sections", value.len())
    }
}

impl Facet for Segments {
    const NAME: &'static str = "segments";
    const ENDPOINT: &'static str = "get_segments";
    type Value = Vec<Segment>;

    fn parse(analysis: Node<'_, '_>) -> AnalysisResult<Self::Value> {
        elements(analysis).map(parse_segment).collect()
    }

    facet_field!(segments);

    fn summary(value: &Self::Value) -> String {
        format!("{} segments", value.len())
    }
}

impl Facet for Duration {
    const NAME: &'static str = "duration";
    const ENDPOINT: &'static str = "get_duration";
    type Value = f64;

    fn parse(analysis: Node<'_, '_>) -> AnalysisResult<Self::Value> {
        parse_text(child(analysis, "duration")?)
    }

    facet_field!(duration);

    fn summary(value: &Self::Value) -> String {
        format!("{}s", value)
    }
}

impl Facet for EndOfFadeIn {
    const NAME: &'static str = "end_of_fade_in";
    const ENDPOINT: &'static str = "get_end_of_fade_in";
    type Value = f64;

    fn parse(analysis: Node<'_, '_>) -> AnalysisResult<Self::Value> {
        parse_text(child(analysis, "end_of_fade_in")?)
    }

    facet_field!(end_of_fade_in);

    fn summary(value: &Self::Value) -> String {
        format!("{}s", value)
    }
}

impl Facet for StartOfFadeOut {
    const NAME: &'static str = "start_of_fade_out";
    const ENDPOINT: &'static str = "get_start_of_fade_out";
    type Value = f64;

    fn parse(analysis: Node<'_, '_>) -> AnalysisResult<Self::Value> {
        parse_text(child(analysis, "start_of_fade_out")?)
    }

    facet_field!(start_of_fade_out);

    fn summary(value: &Self::Value) -> String {
        format!("{}s", value)
    }
}

impl Facet for Loudness {
    const NAME: &'static str = "loudness";
    const ENDPOINT: &'static str = "get_loudness";
    type Value = f64;

    fn parse(analysis: Node<'_, '_>) -> AnalysisResult<Self::Value> {
        parse_text(child(analysis, "loudness")?)
    }

    facet_field!(loudness);

    fn summary(value: &Self::Value) -> String {
        format!("{} dB", value)
    }
}

impl Facet for Key {
    const NAME: &'static str = "key";
    const ENDPOINT: &'static str = "get_key";
    type Value = KeyEstimate;

    fn parse(analysis: Node<'_, '_>) -> AnalysisResult<Self::Value> {
        parse_estimate(analysis, "key")
    }

    facet_field!(key);

    fn summary(value: &Self::Value) -> String {
        format!("{} (confidence {})", value.value, value.confidence)
    }
}

impl Facet for Mode {
    const NAME: &'static str = "mode";
    const ENDPOINT: &'static str = "get_mode";
    type Value = ModeEstimate;

    fn parse(analysis: Node<'_, '_>) -> AnalysisResult<Self::Value> {
        parse_estimate(analysis, "mode")
    }

    facet_field!(mode);

    fn summary(value: &Self::Value) -> String {
        format!("{} (confidence {})", value.value, value.confidence)
    }
}

impl Facet for Tempo {
    const NAME: &'static str = "tempo";
    const ENDPOINT: &'static str = "get_tempo";
    type Value = TempoEstimate;

    fn parse(analysis: Node<'_, '_>) -> AnalysisResult<Self::Value> {
        parse_estimate(analysis, "tempo")
    }

    facet_field!(tempo);

    fn summary(value: &Self::Value) -> String {
        format!("{} bpm (confidence {})", value.value, value.confidence)
    }
}

impl Facet for TimeSignature {
    const NAME: &'static str = "time_signature";
    const ENDPOINT: &'static str = "get_time_signature";
    type Value = TimeSignatureEstimate;

    fn parse(analysis: Node<'_, '_>) -> AnalysisResult<Self::Value> {
        parse_estimate(analysis, "time_signature")
    }

    facet_field!(time_signature);

    fn summary(value: &Self::Value) -> String {
        format!("{} (confidence {})", value.value, value.confidence)
    }
}

impl Facet for TrackMetadata {
    const NAME: &'static str = "metadata";
    const ENDPOINT: &'static str = "get_metadata";
    type Value = Metadata;

    fn parse(analysis: Node<'_, '_>) -> AnalysisResult<Self::Value> {
        Ok(Metadata {
            status: text(child(analysis, "status")?).to_string(),
            id: text(child(analysis, "id")?).to_string(),
            md5: text(child(analysis, "md5")?).to_string(),
            // Tag-derived fields are often absent from the uploaded file
            artist: optional_text(analysis, "artist"),
            release: optional_text(analysis, "release"),
            title: optional_text(analysis, "title"),
            genre: optional_text(analysis, "genre"),
            duration: optional_value(analysis, "duration")?,
            sample_rate: optional_value(analysis, "samplerate")?,
            bit_rate: optional_value(analysis, "bitrate")?,
        })
    }

    facet_field!(metadata);

    fn summary(value: &Self::Value) -> String {
        format!("artist {:?}, title {:?}", value.artist, value.title)
    }
}

/// Names of all facets, in the order the orchestrator fetches them
pub const FACET_NAMES: [&str; 14] = [
    Bars::NAME,
    Beats::NAME,
    Duration::NAME,
    EndOfFadeIn::NAME,
    Key::NAME,
    Loudness::NAME,
    TrackMetadata::NAME,
    Mode::NAME,
    Sections::NAME,
    Segments::NAME,
    StartOfFadeOut::NAME,
    Tatums::NAME,
    Tempo::NAME,
    TimeSignature::NAME,
];

/// Facets not yet loaded into `analysis`
pub fn missing_facets(analysis: &TrackAnalysis) -> Vec<&'static str> {
    let loaded = [
        Bars::peek(analysis).is_some(),
        Beats::peek(analysis).is_some(),
        Duration::peek(analysis).is_some(),
        EndOfFadeIn::peek(analysis).is_some(),
        Key::peek(analysis).is_some(),
        Loudness::peek(analysis).is_some(),
        TrackMetadata::peek(analysis).is_some(),
        Mode::peek(analysis).is_some(),
        Sections::peek(analysis).is_some(),
        Segments::peek(analysis).is_some(),
        StartOfFadeOut::peek(analysis).is_some(),
        Tatums::peek(analysis).is_some(),
        Tempo::peek(analysis).is_some(),
        TimeSignature::peek(analysis).is_some(),
    ];

    FACET_NAMES
        .iter()
        .zip(loaded)
        .filter(|(_, is_loaded)| !is_loaded)
        .map(|(name, _)| *name)
        .collect()
}

fn parse_markers(analysis: Node<'_, '_>) -> AnalysisResult<Vec<Marker>> {
    elements(analysis)
        .map(|node| {
            Ok(Marker {
                confidence: parse_attr(node, "confidence")?,
                time: parse_text(node)?,
            })
        })
        .collect()
}

fn parse_estimate<T: FromStr>(analysis: Node<'_, '_>, tag: &str) -> AnalysisResult<Estimate<T>> {
    let node = child(analysis, tag)?;
    Ok(Estimate {
        confidence: parse_attr(node, "confidence")?,
        value: parse_text(node)?,
    })
}

fn parse_segment(node: Node<'_, '_>) -> AnalysisResult<Segment> {
    let loudness = child(node, "loudness")?;
    // Position 0 is the average level, position 1 the maximum
    let average = nth_element(loudness, 0)?;
    let maximum = nth_element(loudness, 1)?;

    Ok(Segment {
        start: parse_attr(node, "start")?,
        duration: parse_attr(node, "duration")?,
        loudness_average: SegmentLoudness {
            loudness: parse_text(average)?,
            time: parse_attr(average, "time")?,
        },
        loudness_max: SegmentLoudness {
            loudness: parse_text(maximum)?,
            time: parse_attr(maximum, "time")?,
        },
        pitches: parse_vector(child(node, "pitches")?)?,
        timbre: parse_vector(child(node, "timbre")?)?,
    })
}

/// First twelve child values; fewer is an error
fn parse_vector(node: Node<'_, '_>) -> AnalysisResult<[f64; SEGMENT_VECTOR_LEN]> {
    let mut values = [0.0; SEGMENT_VECTOR_LEN];
    let mut count = 0;
    for (slot, element) in values.iter_mut().zip(elements(node)) {
        *slot = parse_text(element)?;
        count += 1;
    }

    if count < SEGMENT_VECTOR_LEN {
        return Err(AnalysisError::Parse(format!(
            "<{}> has {} values, expected {}",
            node.tag_name().name(),
            count,
            SEGMENT_VECTOR_LEN
        )));
    }
    Ok(values)
}

fn optional_text(analysis: Node<'_, '_>, tag: &str) -> String {
    opt_child(analysis, tag)
        .map(|node| text(node).to_string())
        .unwrap_or_default()
}

/// Absent or empty element yields the default; present but malformed is an error
fn optional_value<T: FromStr + Default>(analysis: Node<'_, '_>, tag: &str) -> AnalysisResult<T> {
    match opt_child(analysis, tag) {
        Some(node) if !text(node).is_empty() => parse_text(node),
        _ => Ok(T::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::envelope::parse_analysis;

    fn envelope(payload: &str) -> String {
        format!(
            "<response version=\"3\"><status><code>0</code><message>Success</message></status>\
             <analysis>{}</analysis></response>",
            payload
        )
    }

    fn parse<F: Facet>(payload: &str) -> AnalysisResult<F::Value> {
        parse_analysis(F::ENDPOINT, &envelope(payload), F::parse)
    }

    fn segment_xml(pitch_count: usize, loudness_count: usize) -> String {
        let pitches: String = (0..pitch_count)
            .map(|i| format!("<pitch>0.{}</pitch>", i))
            .collect();
        let timbre: String = (0..12).map(|i| format!("<coeff>{}.5</coeff>", i)).collect();
        let levels = [
            r#"<dB time="0">-60.0</dB>"#,
            r#"<dB time="0.031" type="max">-27.5</dB>"#,
        ];
        let loudness: String = levels[..loudness_count].concat();
        format!(
            r#"<segment start="0.0" duration="0.25"><loudness>{}</loudness><pitches>{}</pitches><timbre>{}</timbre></segment>"#,
            loudness, pitches, timbre
        )
    }

    #[test]
    fn test_parse_bars() {
        let bars = parse::<Bars>(
            r#"
            <bar confidence="0.643">1.0</bar>
            <bar confidence="1">3.5</bar>
            "#,
        )
        .unwrap();
        assert_eq!(
            bars,
            vec![
                Marker { confidence: 0.643, time: 1.0 },
                Marker { confidence: 1.0, time: 3.5 },
            ]
        );
    }

    #[test]
    fn test_empty_sequence_is_loaded_but_empty() {
        let beats = parse::<Beats>("").unwrap();
        assert!(beats.is_empty());
    }

    #[test]
    fn test_malformed_confidence_is_parse_error() {
        let result = parse::<Tatums>(r#"<tatum confidence="high">0.2</tatum>"#);
        assert!(matches!(result, Err(AnalysisError::Parse(_))));
    }

    #[test]
    fn test_out_of_range_confidence_is_not_validated() {
        let beats = parse::<Beats>(r#"<beat confidence="1.7">0.5</beat>"#).unwrap();
        assert_eq!(beats[0].confidence, 1.7);
    }

    #[test]
    fn test_parse_scalars() {
        assert_eq!(parse::<Duration>("<duration>215.24</duration>").unwrap(), 215.24);
        assert_eq!(
            parse::<EndOfFadeIn>("<end_of_fade_in>0.17</end_of_fade_in>").unwrap(),
            0.17
        );
        assert_eq!(
            parse::<StartOfFadeOut>("<start_of_fade_out>209.4</start_of_fade_out>").unwrap(),
            209.4
        );
        assert_eq!(parse::<Loudness>("<loudness>-7.31</loudness>").unwrap(), -7.31);
    }

    #[test]
    fn test_parse_estimates() {
        let key = parse::<Key>(r#"<key confidence="0.42">7</key>"#).unwrap();
        assert_eq!(key, Estimate { confidence: 0.42, value: 7 });

        let mode = parse::<Mode>(r#"<mode confidence="0.8">1</mode>"#).unwrap();
        assert_eq!(mode.value, 1);

        let tempo = parse::<Tempo>(r#"<tempo confidence="0.9">122.4</tempo>"#).unwrap();
        assert_eq!(tempo.value, 122.4);

        // 1 = unknown; opaque server code, passed through
        let signature =
            parse::<TimeSignature>(r#"<time_signature confidence="0">1</time_signature>"#).unwrap();
        assert_eq!(signature.value, 1);
    }

    #[test]
    fn test_parse_sections() {
        let sections = parse::<Sections>(
            r#"<section start="0.0" duration="12.5"/><section start="12.5" duration="30"/>"#,
        )
        .unwrap();
        assert_eq!(sections[1], Section { start: 12.5, duration: 30.0 });
    }

    #[test]
    fn test_parse_segment() {
        let segments = parse::<Segments>(&segment_xml(12, 2)).unwrap();
        let segment = &segments[0];

        assert_eq!(segment.duration, 0.25);
        assert_eq!(segment.loudness_average, SegmentLoudness { loudness: -60.0, time: 0.0 });
        assert_eq!(segment.loudness_max, SegmentLoudness { loudness: -27.5, time: 0.031 });
        assert_eq!(segment.pitches[11], 0.11);
        assert_eq!(segment.timbre[3], 3.5);
    }

    #[test]
    fn test_segment_with_eleven_pitches_fails_whole_facet() {
        let payload = format!("{}{}", segment_xml(12, 2), segment_xml(11, 2));
        let result = parse::<Segments>(&payload);
        assert!(matches!(result, Err(AnalysisError::Parse(_))));
    }

    #[test]
    fn test_segment_with_single_loudness_fails() {
        let result = parse::<Segments>(&segment_xml(12, 1));
        assert!(matches!(result, Err(AnalysisError::Parse(_))));
    }

    #[test]
    fn test_parse_full_metadata() {
        let metadata = parse::<TrackMetadata>(
            r#"
            <status>COMPLETE</status>
            <id>music://id.echonest.com/~/TR/TRLFPPE11C3F10749F</id>
            <md5>004f22f350579edab0a965cb88a472d1</md5>
            <artist>Bradley Strider</artist>
            <release>Beats</release>
            <title>Bradley's Beat</title>
            <genre>Electronic</genre>
            <duration>215.2</duration>
            <samplerate>44100</samplerate>
            <bitrate>320</bitrate>
            "#,
        )
        .unwrap();

        assert_eq!(metadata.artist, "Bradley Strider");
        assert_eq!(metadata.genre, "Electronic");
        assert_eq!(metadata.sample_rate, 44100);
        assert_eq!(metadata.bit_rate, 320);
        assert_eq!(metadata.duration, 215.2);
    }

    #[test]
    fn test_metadata_without_genre_still_loads() {
        let metadata = parse::<TrackMetadata>(
            r#"
            <status>COMPLETE</status>
            <id>TR123</id>
            <md5>900150983cd24fb0d6963f7d28e17f72</md5>
            <artist>Someone</artist>
            <title>Something</title>
            "#,
        )
        .unwrap();

        assert_eq!(metadata.genre, "");
        assert_eq!(metadata.release, "");
        assert_eq!(metadata.sample_rate, 0);
        assert_eq!(metadata.title, "Something");
    }

    #[test]
    fn test_metadata_with_malformed_bitrate_fails() {
        let result = parse::<TrackMetadata>(
            "<status>COMPLETE</status><id>TR1</id><md5>x</md5><bitrate>fast</bitrate>",
        );
        assert!(matches!(result, Err(AnalysisError::Parse(_))));
    }

    #[test]
    fn test_missing_facets_lists_everything_for_new_analysis() {
        let mut analysis = TrackAnalysis::new("abc", 3);
        assert_eq!(missing_facets(&analysis).len(), FACET_NAMES.len());

        *Bars::slot(&mut analysis) = Some(vec![]);
        *Tempo::slot(&mut analysis) = Some(Estimate { confidence: 1.0, value: 120.0 });

        let missing = missing_facets(&analysis);
        assert!(!missing.contains(&"bars"));
        assert!(!missing.contains(&"tempo"));
        assert_eq!(missing.len(), FACET_NAMES.len() - 2);
    }
}
