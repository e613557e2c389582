pub mod search;
pub mod sequence;

pub use search::{PortSearch, SearchContext, SearchPolicy, DEFAULT_MAX_ATTEMPTS};
pub use sequence::{
    commit_reachable_port, run, Collaborators, Commit, ProvisionReport, ProvisionSettings,
};

/// 搜索与部署流程共用的测试替身
#[cfg(test)]
pub(crate) mod testing {
    use crate::error::{GuardError, Result};
    use crate::host::{PortOpener, ServiceRestarter};
    use crate::probe::Prober;
    use std::cell::{Cell, RefCell};
    use std::net::IpAddr;

    pub const REACHABLE: &str = r#"<table>
        <tr id="ping-tcp-CN-1"><td id="tcp-CN-1-result">successful</td></tr>
        <tr id="ping-tcp-CN-2"><td id="tcp-CN-2-result">successful</td></tr>
        <tr id="ping-tcp-CN-3"><td id="tcp-CN-3-result">timeout</td></tr>
    </table>"#;

    pub const UNREACHABLE: &str = r#"<table>
        <tr id="ping-tcp-CN-1"><td id="tcp-CN-1-result">timeout</td></tr>
        <tr id="ping-tcp-CN-2"><td id="tcp-CN-2-result">successful</td></tr>
    </table>"#;

    /// 第 `succeed_on` 次调用返回可达页面，其余返回不可达；记录探测过的端口
    pub struct MockProber {
        succeed_on: Option<usize>,
        stay_reachable: bool,
        fail_with_error: bool,
        ports: RefCell<Vec<u16>>,
    }

    impl MockProber {
        pub fn new(succeed_on: Option<usize>) -> Self {
            Self {
                succeed_on,
                stay_reachable: false,
                fail_with_error: false,
                ports: RefCell::new(Vec::new()),
            }
        }

        /// 从第 `n` 次调用起一直返回可达页面
        pub fn reachable_from(n: usize) -> Self {
            Self {
                stay_reachable: true,
                ..Self::new(Some(n))
            }
        }

        /// 每次都返回浏览器错误
        pub fn erroring() -> Self {
            Self {
                fail_with_error: true,
                ..Self::new(None)
            }
        }

        pub fn calls(&self) -> usize {
            self.ports.borrow().len()
        }

        pub fn ports(&self) -> Vec<u16> {
            self.ports.borrow().clone()
        }
    }

    impl Prober for MockProber {
        async fn probe(&self, _ip: IpAddr, port: u16) -> Result<String> {
            self.ports.borrow_mut().push(port);
            if self.fail_with_error {
                return Err(GuardError::Browser("navigation timeout".to_string()));
            }
            let n = self.calls();
            let reachable = match self.succeed_on {
                Some(k) if self.stay_reachable => n >= k,
                Some(k) => n == k,
                None => false,
            };
            if reachable {
                Ok(REACHABLE.to_string())
            } else {
                Ok(UNREACHABLE.to_string())
            }
        }
    }

    /// 前 `fail_first` 次开放失败
    pub struct MockOpener {
        fail_first: usize,
        calls: Cell<usize>,
    }

    impl MockOpener {
        pub fn ok() -> Self {
            Self::failing_first(0)
        }

        pub fn failing_first(fail_first: usize) -> Self {
            Self {
                fail_first,
                calls: Cell::new(0),
            }
        }

        pub fn calls(&self) -> usize {
            self.calls.get()
        }
    }

    impl PortOpener for MockOpener {
        async fn open(&self, _port: u16) -> Result<()> {
            let n = self.calls.get() + 1;
            self.calls.set(n);
            if n <= self.fail_first {
                return Err(GuardError::Command("ufw allow failed".to_string()));
            }
            Ok(())
        }
    }

    #[derive(Default)]
    pub struct MockService {
        pub fail: bool,
        pub(crate) restarts: Cell<usize>,
    }

    impl MockService {
        pub fn restarts(&self) -> usize {
            self.restarts.get()
        }
    }

    impl ServiceRestarter for MockService {
        async fn restart(&self) -> Result<()> {
            self.restarts.set(self.restarts.get() + 1);
            if self.fail {
                return Err(GuardError::Command("docker compose up failed".to_string()));
            }
            Ok(())
        }
    }
}
