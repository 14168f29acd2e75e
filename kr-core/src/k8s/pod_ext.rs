use super::*;

// One container log stream that is worth asking the apiserver for.  `previous` streams belong to
// the container instance that ran before the last restart.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LogStream {
    pub container: String,
    pub previous: bool,
}

pub trait PodExt {
    fn status(&self) -> anyhow::Result<&corev1::PodStatus>;
    fn condition_is_true(&self, condition_type: &str) -> bool;
    fn log_streams(&self) -> Vec<LogStream>;
}

impl PodExt for corev1::Pod {
    fn status(&self) -> anyhow::Result<&corev1::PodStatus> {
        match self.status.as_ref() {
            None => bail!(KubernetesError::field_not_found("pod status")),
            Some(ps) => Ok(ps),
        }
    }

    fn condition_is_true(&self, condition_type: &str) -> bool {
        self.status
            .as_ref()
            .and_then(|s| s.conditions.as_ref())
            .is_some_and(|conds| conds.iter().any(|c| c.type_ == condition_type && c.status == CONDITION_TRUE))
    }

    // Streams come back in pod-spec order (init containers first), and for each container the
    // terminated instance comes before the current one, so that reading them in sequence gives the
    // lines in the order they were actually written.  Containers that have never started (waiting,
    // no status yet) have nothing to read.
    fn log_streams(&self) -> Vec<LogStream> {
        let Ok(status) = self.status() else {
            return vec![];
        };

        let statuses: Vec<&corev1::ContainerStatus> = status
            .init_container_statuses
            .iter()
            .flatten()
            .chain(status.container_statuses.iter().flatten())
            .collect();

        let spec_order: Vec<&str> = match self.spec.as_ref() {
            Some(spec) => spec
                .init_containers
                .iter()
                .flatten()
                .chain(spec.containers.iter())
                .map(|c| c.name.as_str())
                .collect(),
            None => statuses.iter().map(|cs| cs.name.as_str()).collect(),
        };

        let mut streams = vec![];
        for name in spec_order {
            let Some(cs) = statuses.iter().find(|cs| cs.name == name) else {
                continue;
            };

            if cs.last_state.as_ref().is_some_and(|s| s.terminated.is_some()) {
                streams.push(LogStream { container: name.into(), previous: true });
            }

            if cs.state.as_ref().is_some_and(|s| s.running.is_some() || s.terminated.is_some()) {
                streams.push(LogStream { container: name.into(), previous: false });
            }
        }
        streams
    }
}
