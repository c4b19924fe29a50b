//! Launches real script chains through the platform shell.
#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use cocoon_config::{Architecture, BundleDescriptor};
use cocoon_rendezvous::ChannelName;
use cocoon_supervisor::{Presenter, Supervisor, SupervisorState};
use cocoon_telemetry::{LogConfig, build_subscriber};
use cocoon_test::CocoonFixture;

#[derive(Default)]
struct Silent(Mutex<Vec<String>>);

impl Presenter for Silent {
    fn report_fatal(&self, message: &str) {
        self.0.lock().unwrap().push(message.to_owned());
    }

    fn show_message(&self, _title: &str, text: &str) {
        self.0.lock().unwrap().push(text.to_owned());
    }
}

fn descriptor(fixture: &CocoonFixture, app_script: &str) -> BundleDescriptor {
    let script = fixture.write_script(".", "MyApp", app_script);
    BundleDescriptor::default_for(&fixture.paths(), script, Architecture::detect())
}

fn make_executable(path: &Path) {
    fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
}

fn supervisor(bundle: BundleDescriptor, fixture: &CocoonFixture) -> Supervisor {
    Supervisor::new(
        bundle.validate().unwrap(),
        fixture.exe(),
        Arc::new(Silent::default()),
    )
}

#[tokio::test]
async fn test_scripts_run_in_order() {
    let fixture = CocoonFixture::new("MyApp");
    let trace = fixture.path().join("trace.txt");
    let trace_str = trace.display().to_string();

    let wrapper = fixture.write_script(".", "cocoon_init", &format!("echo wrapper >> '{trace_str}'\nexport FROM_WRAPPER=yes\n"));
    let runtime = fixture.write_script("runtime", "init", &format!("echo runtime >> '{trace_str}'\n"));
    let mut bundle = descriptor(
        &fixture,
        &format!("echo \"app [$FROM_WRAPPER]\" >> '{trace_str}'\n"),
    );
    bundle.cocoon_startup_script = Some(wrapper);
    bundle.runtime_startup_script = Some(runtime);

    let mut supervisor = supervisor(bundle, &fixture);
    supervisor.start().unwrap();
    let code = supervisor.wait().await.unwrap();

    assert_eq!(code, Some(0));
    assert_eq!(supervisor.state(), SupervisorState::Exited { code: Some(0) });
    assert_eq!(
        fs::read_to_string(&trace).unwrap(),
        "wrapper\nruntime\napp []\n"
    );
}

#[tokio::test]
async fn test_exit_in_preparation_script_ends_only_that_script() {
    let fixture = CocoonFixture::new("MyApp");
    let marker = fixture.path().join("app-ran");
    let wrapper = fixture.write_script(".", "cocoon_init", "echo prep\nexit 0\n");
    let runtime = fixture.write_script("runtime", "init", "exit 0\n");
    let mut bundle = descriptor(&fixture, &format!("touch '{}'\n", marker.display()));
    bundle.cocoon_startup_script = Some(wrapper);
    bundle.runtime_startup_script = Some(runtime);

    let mut supervisor = supervisor(bundle, &fixture);
    supervisor.start().unwrap();

    assert_eq!(supervisor.wait().await.unwrap(), Some(0));
    assert!(marker.exists());
}

#[tokio::test]
async fn test_application_exit_status_is_reported() {
    let fixture = CocoonFixture::new("MyApp");
    let bundle = descriptor(&fixture, "echo working\nexit 7\n");

    let mut supervisor = supervisor(bundle, &fixture);
    supervisor.start().unwrap();

    assert_eq!(supervisor.wait().await.unwrap(), Some(7));
    assert_eq!(supervisor.state(), SupervisorState::Exited { code: Some(7) });
}

#[tokio::test]
async fn test_executable_script_uses_its_own_interpreter() {
    if !Path::new("/bin/bash").exists() {
        return;
    }
    let fixture = CocoonFixture::new("MyApp");
    let marker = fixture.path().join("app-ran");
    let runtime = fixture.write_script("runtime", "init", "#!/bin/bash\n[[ 1 == 1 ]]\n");
    make_executable(&runtime);
    let mut bundle = descriptor(
        &fixture,
        &format!("#!/bin/bash\nif [[ -n \"$BASH_VERSION\" ]]; then touch '{}'; fi\n", marker.display()),
    );
    make_executable(&bundle.app_startup_script);
    bundle.runtime_startup_script = Some(runtime);

    let mut supervisor = supervisor(bundle, &fixture);
    supervisor.start().unwrap();

    assert_eq!(supervisor.wait().await.unwrap(), Some(0));
    assert!(marker.exists());
}

#[tokio::test]
async fn test_failing_bash_application_is_not_reported_as_success() {
    if !Path::new("/bin/bash").exists() {
        return;
    }
    let fixture = CocoonFixture::new("MyApp");
    let bundle = descriptor(&fixture, "#!/bin/bash\n[[ 1 == 2 ]]\n");
    make_executable(&bundle.app_startup_script);

    let mut supervisor = supervisor(bundle, &fixture);
    supervisor.start().unwrap();

    assert_eq!(supervisor.wait().await.unwrap(), Some(1));
}

#[tokio::test]
async fn test_missing_optional_scripts_are_skipped() {
    let fixture = CocoonFixture::new("MyApp");
    let mut bundle = descriptor(&fixture, "echo launched\n");
    bundle.cocoon_startup_script = Some(fixture.path().join("absent.sh"));
    bundle.runtime_startup_script = Some(fixture.path().join("runtime/absent.sh"));

    let mut supervisor = supervisor(bundle, &fixture);
    supervisor.start().unwrap();
    assert_eq!(supervisor.wait().await.unwrap(), Some(0));

    let stdout = fs::read_to_string(fixture.path().join("MyApp.stdout")).unwrap();
    assert!(stdout.contains("stdout attached"));
    assert!(stdout.ends_with("launched\n"));
}

#[tokio::test]
async fn test_failing_script_short_circuits_chain() {
    let fixture = CocoonFixture::new("MyApp");
    let marker = fixture.path().join("app-ran");
    let wrapper = fixture.write_script(".", "cocoon_init", "false\n");
    let mut bundle = descriptor(&fixture, &format!("touch '{}'\n", marker.display()));
    bundle.cocoon_startup_script = Some(wrapper);

    let mut supervisor = supervisor(bundle, &fixture);
    supervisor.start().unwrap();
    let code = supervisor.wait().await.unwrap();

    assert_ne!(code, Some(0));
    assert!(!marker.exists());
}

#[tokio::test]
async fn test_child_sees_cocoon_environment() {
    let fixture = CocoonFixture::new("MyApp");
    let bundle = descriptor(
        &fixture,
        "echo \"pid=$COCOON_PID\"\necho \"dir=$COCOON_APPDIR\"\necho \"runtime=[$COCOON_RUNTIME]\"\necho \"args=$COCOON_ARGUMENTS\"\necho \"cwd=$(pwd)\"\n",
    );

    let mut supervisor = supervisor(bundle, &fixture).with_args(vec!["--flag".to_owned()]);
    supervisor.start().unwrap();
    supervisor.wait().await.unwrap();

    let stdout = fs::read_to_string(fixture.path().join("MyApp.stdout")).unwrap();
    let app_dir = fixture.path().display().to_string();
    assert!(stdout.contains(&format!("pid={}", std::process::id())));
    assert!(stdout.contains(&format!("dir={app_dir}")));
    assert!(stdout.contains("runtime=[]"));
    assert!(stdout.contains(&format!(
        "args=--flag --cocoon-pid={}",
        std::process::id()
    )));
    assert!(stdout.contains("cwd="));
}

#[tokio::test]
async fn test_output_goes_to_logs_subdir_when_present() {
    let fixture = CocoonFixture::new("MyApp");
    fixture.create_dir("logs");
    let bundle = descriptor(&fixture, "echo out\necho err >&2\n");

    let mut supervisor = supervisor(bundle, &fixture);
    supervisor.start().unwrap();
    supervisor.wait().await.unwrap();

    let logs = fixture.path().join("logs");
    assert!(fs::read_to_string(logs.join("MyApp.stdout")).unwrap().ends_with("out\n"));
    assert!(fs::read_to_string(logs.join("MyApp.stderr")).unwrap().ends_with("err\n"));
    assert!(!fixture.path().join("MyApp.stdout").exists());
}

#[tokio::test]
async fn test_stop_kills_running_child() {
    let fixture = CocoonFixture::new("MyApp");
    let bundle = descriptor(&fixture, "exec sleep 30\n");

    let mut supervisor = supervisor(bundle, &fixture);
    supervisor.start().unwrap();
    assert_eq!(supervisor.state(), SupervisorState::Running);
    assert!(supervisor.child_id().is_some());

    supervisor.stop().await.unwrap();
    assert_eq!(supervisor.state(), SupervisorState::Killed);
    assert!(supervisor.child_id().is_none());

    // Nothing tracked any more.
    supervisor.stop().await.unwrap();
    assert_eq!(supervisor.state(), SupervisorState::Killed);
}

#[tokio::test]
async fn test_stop_without_child_is_noop() {
    let fixture = CocoonFixture::new("MyApp");
    let bundle = descriptor(&fixture, "true\n");
    let mut supervisor = supervisor(bundle, &fixture);

    supervisor.stop().await.unwrap();
    assert_eq!(supervisor.state(), SupervisorState::Idle);
}

#[tokio::test]
async fn test_stop_with_channel_kills_after_notify_window() {
    let fixture = CocoonFixture::new("MyApp");
    let mut bundle = descriptor(&fixture, "exec sleep 30\n");
    bundle.use_pipe = true;
    let name = ChannelName::from_raw(fixture.path().join("c.sock").display().to_string());

    let mut supervisor = supervisor(bundle, &fixture)
        .with_channel_name(name.clone())
        .with_notify_window(Duration::from_millis(100));
    supervisor.prepare().unwrap();
    assert!(supervisor.open_channel());
    supervisor.start().unwrap();

    supervisor.stop().await.unwrap();
    assert_eq!(supervisor.state(), SupervisorState::Killed);
    assert!(!supervisor.channel().unwrap().is_listening());

    supervisor.close_channel().await;
    assert!(supervisor.channel().is_none());
}

#[tokio::test]
async fn test_channel_name_exported_when_listening() {
    let fixture = CocoonFixture::new("MyApp");
    let mut bundle = descriptor(&fixture, "echo \"npipe=$COCOON_NPIPE\"\n");
    bundle.use_pipe = true;
    let name = ChannelName::from_raw(fixture.path().join("c.sock").display().to_string());

    let mut supervisor = supervisor(bundle, &fixture).with_channel_name(name.clone());
    supervisor.prepare().unwrap();
    assert!(supervisor.open_channel());
    supervisor.start().unwrap();
    supervisor.wait().await.unwrap();
    supervisor.close_channel().await;

    let stdout = fs::read_to_string(fixture.path().join("MyApp.stdout")).unwrap();
    assert!(stdout.contains(&format!("npipe={name}")));
}

#[tokio::test]
async fn test_start_twice_is_rejected() {
    let fixture = CocoonFixture::new("MyApp");
    let bundle = descriptor(&fixture, "true\n");
    let mut supervisor = supervisor(bundle, &fixture);

    supervisor.start().unwrap();
    assert!(supervisor.start().is_err());
    supervisor.wait().await.unwrap();
}

#[tokio::test]
async fn test_diagnostics_land_in_stderr_capture() {
    let fixture = CocoonFixture::new("MyApp");
    let bundle = descriptor(&fixture, "true\n");

    let (subscriber, logging) =
        build_subscriber(&LogConfig::new("info").without_timestamps()).unwrap();
    let _guard = tracing::subscriber::set_default(subscriber);
    tracing::info!("logged before capture");

    let mut supervisor = supervisor(bundle, &fixture).with_logging(logging);
    supervisor.prepare().unwrap();

    let stderr = fs::read_to_string(fixture.path().join("MyApp.stderr")).unwrap();
    assert!(stderr.contains("stderr attached"));
    assert!(stderr.contains("logged before capture"));
    assert!(stderr.contains("output capture ready"));
}
