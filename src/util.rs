use std::fmt::{Display, LowerHex};
use std::io::Write;
use std::sync::Once;

use anyhow::Result;
use chrono::Local;

static INIT_LOGGER_ONCE: Once = Once::new();

pub fn init() {
    INIT_LOGGER_ONCE.call_once(|| {
        dotenv::dotenv().ok();

        env_logger::builder()
            .format(|buf, record| {
                writeln!(
                    buf,
                    "[{} {:<5} {}] {}",
                    Local::now().format("%Y-%m-%d %H:%M:%S"),
                    record.level(),
                    record.module_path().unwrap(),
                    record.args()
                )
            })
            .init();
    })
}

pub fn fmt_addr<T>(d: &T, f: &mut std::fmt::Formatter) -> Result<(), std::fmt::Error>
where
    T: Display + LowerHex,
{
    write!(f, "0x{:x} @{}", d, d)
}

#[cfg(test)]
mod util_tests {
    use std::env::set_var;

    use log::info;

    use super::*;

    fn setup() {
        set_var("RUST_LOG", "info");
        init();
    }

    #[test]
    fn fmt_addr_writes_hex_and_decimal() {
        setup();
        info!("smoke test for logger init");
        struct Wrapper(u64);
        impl Display for Wrapper {
            fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
        impl LowerHex for Wrapper {
            fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                std::fmt::LowerHex::fmt(&self.0, f)
            }
        }
        struct Holder(Wrapper);
        impl std::fmt::Debug for Holder {
            fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                fmt_addr(&self.0, f)
            }
        }
        let s = format!("{:?}", Holder(Wrapper(255)));
        assert_eq!(s, "0xff @255");
    }
}
