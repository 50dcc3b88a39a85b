use k8s_openapi::api::core::v1 as k8s;

#[derive(Clone, Debug, PartialEq)]
pub struct Volume {
    pub name: String,
    pub source: VolumeSource,
}

impl Volume {
    pub fn empty_dir(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: VolumeSource::EmptyDir { medium: None },
        }
    }

    pub fn into_k8s(self) -> k8s::Volume {
        let VolumeSource::EmptyDir { medium } = self.source;
        k8s::Volume {
            name: self.name,
            empty_dir: Some(k8s::EmptyDirVolumeSource {
                medium,
                size_limit: None,
            }),
            ..Default::default()
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum VolumeSource {
    EmptyDir { medium: Option<String> },
}
