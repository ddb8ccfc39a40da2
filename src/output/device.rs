use adbhost::adb::{DeviceInfo, ForwardMapping};

use crate::output::TableFormat;

impl TableFormat for DeviceInfo {
    fn headers() -> Vec<&'static str> {
        vec!["SERIAL", "TRANSPORT ID", "MODEL", "PRODUCT", "DEVICE"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.serial.clone(),
            self.transport_id.to_string(),
            self.model.clone().unwrap_or_default(),
            self.product.clone().unwrap_or_default(),
            self.device_type.clone().unwrap_or_default(),
        ]
    }
}

impl TableFormat for ForwardMapping {
    fn headers() -> Vec<&'static str> {
        vec!["SERIAL", "LOCAL", "REMOTE"]
    }

    fn row(&self) -> Vec<String> {
        vec![self.serial.clone(), self.local.clone(), self.remote.clone()]
    }
}
