//! Kernel device events and the backlog source contract.

/// One kernel device event.
///
/// Produced once while the backlog is drained and read-only afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Uevent {
    /// Event action (`add`, `remove`, `change`, ...).
    pub action: String,
    /// Device path relative to the sysfs mount, e.g. `/devices/virtual/mem/null`.
    pub path: String,
    /// Owning subsystem (`block`, `tty`, ...), empty when unknown.
    pub subsystem: String,
    /// Device node name below `/dev`, if the device has one.
    pub device_name: Option<String>,
    /// Firmware file requested by the device.
    pub firmware: Option<String>,
    /// Module alias used for driver matching.
    pub modalias: Option<String>,
    /// Partition name for block partitions.
    pub partition_name: Option<String>,
    /// Partition number for block partitions.
    pub partition_num: Option<u32>,
    /// Device major number.
    pub major: Option<u32>,
    /// Device minor number.
    pub minor: Option<u32>,
}

impl Uevent {
    /// Build an `add` event from the contents of a sysfs `uevent` file.
    ///
    /// Unknown keys and lines without `=` are ignored. Numeric fields that
    /// fail to parse are left unset.
    pub fn from_sysfs(path: impl Into<String>, contents: &str) -> Self {
        let mut uevent = Self {
            action: "add".to_owned(),
            path: path.into(),
            ..Self::default()
        };

        for line in contents.lines() {
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let value = value.trim();
            match key.trim() {
                "ACTION" => uevent.action = value.to_owned(),
                "SUBSYSTEM" => uevent.subsystem = value.to_owned(),
                "DEVNAME" => uevent.device_name = Some(value.to_owned()),
                "FIRMWARE" => uevent.firmware = Some(value.to_owned()),
                "MODALIAS" => uevent.modalias = Some(value.to_owned()),
                "PARTNAME" => uevent.partition_name = Some(value.to_owned()),
                "PARTN" => uevent.partition_num = value.parse().ok(),
                "MAJOR" => uevent.major = value.parse().ok(),
                "MINOR" => uevent.minor = value.parse().ok(),
                _ => {}
            }
        }

        uevent
    }
}

/// Directive returned by a backlog callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerAction {
    /// Keep delivering events.
    Continue,
    /// Stop delivering events.
    Stop,
}

/// A source able to replay every device event currently known to the kernel.
pub trait UeventSource {
    /// Deliver the backlog synchronously, one callback invocation per event,
    /// until the backlog is exhausted or the callback returns
    /// [`ListenerAction::Stop`].
    fn regenerate_uevents(&mut self, callback: &mut dyn FnMut(Uevent) -> ListenerAction);
}

/// Ordered, immutable snapshot of the drained backlog.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UeventQueue {
    events: Vec<Uevent>,
}

impl UeventQueue {
    /// Drain `source` once into a new queue, in delivery order.
    ///
    /// Always answers [`ListenerAction::Continue`] so the full backlog is
    /// delivered. No filtering, no deduplication.
    pub fn drain(source: &mut dyn UeventSource) -> Self {
        let mut events = Vec::new();
        source.regenerate_uevents(&mut |uevent| {
            events.push(uevent);
            ListenerAction::Continue
        });
        Self { events }
    }

    /// Number of queued events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Returns `true` when no events were drained.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Event at `index`, if any.
    pub fn get(&self, index: usize) -> Option<&Uevent> {
        self.events.get(index)
    }

    /// All events in delivery order.
    pub fn as_slice(&self) -> &[Uevent] {
        &self.events
    }
}

impl From<Vec<Uevent>> for UeventQueue {
    fn from(events: Vec<Uevent>) -> Self {
        Self { events }
    }
}
