pub use std::collections::BTreeMap;

// Generate labels for a k8s object, using klabel!("label1" = "value1", "label2" = "value2") syntax
#[macro_export]
macro_rules! klabel {
    ($($key:tt=$val:literal),+$(,)?) => {
        Some(BTreeMap::from([$(($key.to_string(), $val.to_string())),+]))
    };
}

// Build a requirements map for the label/annotation matchers, using the same syntax as klabel!
#[macro_export]
macro_rules! kreq {
    ($($key:tt=$val:literal),*$(,)?) => {
        BTreeMap::<String, String>::from([$(($key.to_string(), $val.to_string())),*])
    };
}

pub use {
    klabel,
    kreq,
};
