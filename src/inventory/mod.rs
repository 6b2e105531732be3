use std::io::Write;

use crate::errors::{Error, Result};
use async_trait::async_trait;
use aws_sdk_ec2::types::{Instance, Tag, Volume};
use serde::{Deserialize, Serialize};

/// Conventional tag key carrying the human-readable instance name.
pub const NAME_TAG_KEY: &str = "Name";

/// Narrow view over the EC2 API consumed by the reporter.
/// Anything that lists volumes and resolves instances can back it.
#[async_trait]
pub trait VolumeSource {
    /// Lists every volume in the target region, in provider order.
    async fn list_volumes(&self) -> Result<Vec<Volume>>;

    /// Fetches the instance referenced by a volume attachment.
    async fn get_instance(&self, instance_id: &str) -> Result<Instance>;
}

/// One row of the final report: a volume paired with the named
/// instance it is attached to.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct VolumeReport {
    pub instance_id: String,
    pub instance_name: String,
    pub volume_id: String,
    pub volume_size_gb: i32,
    pub volume_state: String,
}

impl VolumeReport {
    /// Builds the report row for the (instance, volume) pair.
    /// Returns "None" when the instance carries no "Name" tag.
    pub fn new(instance: &Instance, volume: &Volume) -> Option<Self> {
        let name = first_name_tag(instance.tags().unwrap_or(&[]))?;

        let instance_id = match instance.instance_id() {
            Some(v) => v.to_string(),
            None => String::new(),
        };
        let volume_state = match volume.state() {
            Some(v) => v.as_str().to_string(),
            None => String::new(),
        };

        Some(Self {
            instance_id,
            instance_name: name.to_string(),
            volume_id: volume.volume_id().unwrap_or("").to_string(),
            volume_size_gb: volume.size().unwrap_or(0),
            volume_state,
        })
    }
}

impl std::fmt::Display for VolumeReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "['{}', '{}', '{}', {}, '{}']",
            self.instance_id,
            self.instance_name,
            self.volume_id,
            self.volume_size_gb,
            self.volume_state
        )
    }
}

/// Scans the tags in provider order and returns the value of the first
/// "Name" key. Later duplicates are ignored.
pub fn first_name_tag(tags: &[Tag]) -> Option<&str> {
    for tag in tags.iter() {
        if tag.key() == Some(NAME_TAG_KEY) {
            return tag.value();
        }
    }
    None
}

/// Returns the instance id of the first attachment, if any.
/// Additional attachments of a multi-attach volume are not reported.
fn first_attached_instance(volume: &Volume) -> Option<&str> {
    let attachments = volume.attachments().unwrap_or(&[]);
    attachments.first().and_then(|a| a.instance_id())
}

/// Walks every volume from the source and pairs the attached ones with
/// their instance's "Name" tag. Volumes without an attachment, and
/// instances without a "Name" tag, contribute nothing. Records keep the
/// listing order of their source volumes.
pub async fn collect<S: VolumeSource>(source: &S) -> Result<Vec<VolumeReport>> {
    let volumes = source.list_volumes().await?;

    let mut reports: Vec<VolumeReport> = Vec::new();
    for volume in volumes.iter() {
        let instance_id = match first_attached_instance(volume) {
            Some(v) => v,
            None => continue,
        };

        let instance = source.get_instance(instance_id).await?;
        if let Some(report) = VolumeReport::new(&instance, volume) {
            reports.push(report);
        }
    }

    log::info!("collected {} report records", reports.len());
    Ok(reports)
}

/// Writes the plain row-per-record rendition.
pub fn write_text<W: Write>(w: &mut W, reports: &[VolumeReport]) -> Result<()> {
    for report in reports.iter() {
        writeln!(w, "{}", report).map_err(|e| Error::Other {
            message: format!("failed to write report row {:?}", e),
            retryable: false,
        })?;
    }
    Ok(())
}

/// Writes the report as a pretty-printed JSON array.
pub fn write_json<W: Write>(w: &mut W, reports: &[VolumeReport]) -> Result<()> {
    let body = serde_json::to_string_pretty(reports).map_err(|e| Error::Other {
        message: format!("failed to encode report {:?}", e),
        retryable: false,
    })?;
    writeln!(w, "{}", body).map_err(|e| Error::Other {
        message: format!("failed to write report {:?}", e),
        retryable: false,
    })
}

/// Writes the report as CSV with a header row.
pub fn write_csv<W: Write>(w: &mut W, reports: &[VolumeReport]) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(w);
    for report in reports.iter() {
        wtr.serialize(report).map_err(|e| Error::Other {
            message: format!("failed to serialize report row {:?}", e),
            retryable: false,
        })?;
    }
    wtr.flush().map_err(|e| Error::Other {
        message: format!("failed to flush report {:?}", e),
        retryable: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_ec2::types::{VolumeAttachment, VolumeState};
    use std::collections::HashMap;

    struct FakeSource {
        volumes: Vec<Volume>,
        instances: HashMap<String, Instance>,
    }

    #[async_trait]
    impl VolumeSource for FakeSource {
        async fn list_volumes(&self) -> Result<Vec<Volume>> {
            Ok(self.volumes.clone())
        }

        async fn get_instance(&self, instance_id: &str) -> Result<Instance> {
            match self.instances.get(instance_id) {
                Some(v) => Ok(v.clone()),
                None => Err(Error::API {
                    message: format!("instance '{}' not found", instance_id),
                    retryable: false,
                }),
            }
        }
    }

    fn volume(id: &str, size: i32, state: &str, attached_to: Option<&str>) -> Volume {
        let mut b = Volume::builder()
            .volume_id(id)
            .size(size)
            .state(VolumeState::from(state));
        if let Some(instance_id) = attached_to {
            b = b.attachments(VolumeAttachment::builder().instance_id(instance_id).build());
        }
        b.build()
    }

    fn instance(id: &str, tags: &[(&str, &str)]) -> Instance {
        let mut b = Instance::builder().instance_id(id);
        for (k, v) in tags.iter() {
            b = b.tags(Tag::builder().key(*k).value(*v).build());
        }
        b.build()
    }

    fn source(volumes: Vec<Volume>, instances: Vec<Instance>) -> FakeSource {
        let instances = instances
            .into_iter()
            .map(|i| (i.instance_id().unwrap().to_string(), i))
            .collect();
        FakeSource { volumes, instances }
    }

    #[tokio::test]
    async fn skips_volume_without_attachment() {
        let src = source(vec![volume("vol-2", 20, "available", None)], vec![]);

        let reports = collect(&src).await.unwrap();
        assert!(reports.is_empty());
    }

    #[tokio::test]
    async fn reports_attached_volume_with_named_instance() {
        let src = source(
            vec![volume("vol-1", 8, "in-use", Some("i-1"))],
            vec![instance(
                "i-1",
                &[("Env", "prod"), ("Name", "web-1"), ("Team", "infra")],
            )],
        );

        let reports = collect(&src).await.unwrap();
        assert_eq!(
            reports,
            vec![VolumeReport {
                instance_id: String::from("i-1"),
                instance_name: String::from("web-1"),
                volume_id: String::from("vol-1"),
                volume_size_gb: 8,
                volume_state: String::from("in-use"),
            }]
        );
    }

    #[tokio::test]
    async fn skips_instance_without_name_tag() {
        let src = source(
            vec![
                volume("vol-1", 8, "in-use", Some("i-1")),
                volume("vol-2", 30, "in-use", Some("i-2")),
            ],
            vec![
                instance("i-1", &[("Env", "prod"), ("Team", "infra")]),
                instance("i-2", &[]),
            ],
        );

        let reports = collect(&src).await.unwrap();
        assert!(reports.is_empty());
    }

    #[tokio::test]
    async fn keeps_volume_listing_order() {
        let src = source(
            vec![
                volume("vol-a", 8, "in-use", Some("i-1")),
                volume("vol-b", 16, "in-use", Some("i-2")),
                volume("vol-c", 32, "in-use", Some("i-1")),
            ],
            vec![
                instance("i-1", &[("Name", "web-1")]),
                instance("i-2", &[("Name", "db-1")]),
            ],
        );

        let reports = collect(&src).await.unwrap();
        let ids: Vec<&str> = reports.iter().map(|r| r.volume_id.as_str()).collect();
        assert_eq!(ids, vec!["vol-a", "vol-b", "vol-c"]);
    }

    #[tokio::test]
    async fn collect_is_idempotent() {
        let src = source(
            vec![
                volume("vol-a", 8, "in-use", Some("i-1")),
                volume("vol-b", 16, "available", None),
            ],
            vec![instance("i-1", &[("Name", "web-1")])],
        );

        let first = collect(&src).await.unwrap();
        let second = collect(&src).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn missing_instance_fails_the_run() {
        let src = source(vec![volume("vol-1", 8, "in-use", Some("i-gone"))], vec![]);

        let err = collect(&src).await.unwrap_err();
        assert!(err.message().contains("i-gone"));
    }

    #[tokio::test]
    async fn renders_one_tuple_row_per_attached_named_volume() {
        let src = source(
            vec![
                volume("vol-1", 8, "in-use", Some("i-1")),
                volume("vol-2", 20, "available", None),
            ],
            vec![instance(
                "i-1",
                &[("Env", "prod"), ("Name", "db-primary")],
            )],
        );

        let reports = collect(&src).await.unwrap();
        let mut out: Vec<u8> = Vec::new();
        write_text(&mut out, &reports).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "['i-1', 'db-primary', 'vol-1', 8, 'in-use']\n"
        );
    }

    #[test]
    fn first_name_tag_wins_over_duplicates() {
        let tags = vec![
            Tag::builder().key("Env").value("prod").build(),
            Tag::builder().key("Name").value("web-1").build(),
            Tag::builder().key("Name").value("web-2").build(),
        ];
        assert_eq!(first_name_tag(&tags), Some("web-1"));
    }

    #[test]
    fn first_name_tag_without_match() {
        let tags = vec![Tag::builder().key("Env").value("prod").build()];
        assert_eq!(first_name_tag(&tags), None);
        assert_eq!(first_name_tag(&[]), None);
    }

    #[test]
    fn writes_csv_with_header() {
        let reports = vec![VolumeReport {
            instance_id: String::from("i-1"),
            instance_name: String::from("web-1"),
            volume_id: String::from("vol-1"),
            volume_size_gb: 8,
            volume_state: String::from("in-use"),
        }];

        let mut out: Vec<u8> = Vec::new();
        write_csv(&mut out, &reports).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "instance_id,instance_name,volume_id,volume_size_gb,volume_state\n\
             i-1,web-1,vol-1,8,in-use\n"
        );
    }

    #[test]
    fn writes_json_array() {
        let reports = vec![VolumeReport {
            instance_id: String::from("i-1"),
            instance_name: String::from("web-1"),
            volume_id: String::from("vol-1"),
            volume_size_gb: 8,
            volume_state: String::from("in-use"),
        }];

        let mut out: Vec<u8> = Vec::new();
        write_json(&mut out, &reports).unwrap();
        let parsed: Vec<VolumeReport> = serde_json::from_slice(&out).unwrap();
        assert_eq!(parsed, reports);
    }
}
