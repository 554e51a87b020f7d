use std::fs;
use std::path::Path;
use std::process::{Command, Output, Stdio};

fn minishell(script: &str, dir: &Path) -> Output {
    Command::new(env!("CARGO_BIN_EXE_minishell"))
        .arg("-c")
        .arg(script)
        .current_dir(dir)
        .stdin(Stdio::null())
        .output()
        .expect("failed to start minishell")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn echo_through_cat_into_a_file() {
    let dir = tempfile::tempdir().unwrap();
    let out = minishell("echo hi | cat > out.txt", dir.path());
    assert_eq!(out.status.code(), Some(0));
    assert_eq!(fs::read_to_string(dir.path().join("out.txt")).unwrap(), "hi\n");
}

#[test]
fn large_output_through_a_pipe_does_not_deadlock() {
    let dir = tempfile::tempdir().unwrap();
    let out = minishell("seq 1 200000 | wc -l", dir.path());
    assert_eq!(out.status.code(), Some(0));
    assert_eq!(stdout(&out).trim(), "200000");
}

#[test]
fn three_stage_pipeline() {
    let dir = tempfile::tempdir().unwrap();
    let out = minishell("printf 'b\\na\\nc\\n' | sort | head -n 2", dir.path());
    assert_eq!(stdout(&out), "a\nb\n");
}

#[test]
fn status_of_the_rightmost_command() {
    let dir = tempfile::tempdir().unwrap();
    assert_eq!(minishell("false | true", dir.path()).status.code(), Some(0));
    assert_eq!(minishell("true | false", dir.path()).status.code(), Some(1));
}

#[test]
fn status_is_visible_through_dollar_question() {
    let dir = tempfile::tempdir().unwrap();
    let out = minishell("false\necho $?\nno_such_command_xyz\necho \"$?\"", dir.path());
    assert_eq!(stdout(&out), "1\n127\n");
}

#[test]
fn command_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let out = minishell("no_such_command_xyz", dir.path());
    assert_eq!(out.status.code(), Some(127));
    assert_eq!(stderr(&out), "minishell: no_such_command_xyz: command not found\n");
}

#[test]
fn missing_path_and_non_executable_file() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("script.sh"), "echo nope\n").unwrap();

    let out = minishell("./missing", dir.path());
    assert_eq!(out.status.code(), Some(127));
    assert_eq!(stderr(&out), "minishell: ./missing: No such file or directory\n");

    let out = minishell("./script.sh", dir.path());
    assert_eq!(out.status.code(), Some(126));
    assert_eq!(stderr(&out), "minishell: ./script.sh: Permission denied\n");
}

#[test]
fn signal_death_is_128_plus_signal() {
    let dir = tempfile::tempdir().unwrap();
    let out = minishell("sh -c 'kill -TERM $$'", dir.path());
    assert_eq!(out.status.code(), Some(143));
}

#[test]
fn heredoc_feeds_the_command() {
    let dir = tempfile::tempdir().unwrap();
    let script = "export WHO=world\ncat <<EOF\nhello $WHO\n'$WHO'\nEOF\ncat <<'EOF'\n$WHO\nEOF";
    let out = minishell(script, dir.path());
    assert_eq!(out.status.code(), Some(0));
    assert_eq!(stdout(&out), "hello world\n'world'\n$WHO\n");
}

#[test]
fn heredoc_without_delimiter_warns() {
    let dir = tempfile::tempdir().unwrap();
    let out = minishell("cat <<EOF\nonly line", dir.path());
    assert_eq!(stdout(&out), "only line\n");
    assert!(stderr(&out).contains("here-document delimited by end-of-file (wanted `EOF')"));
}

#[test]
fn redirections_left_to_right() {
    let dir = tempfile::tempdir().unwrap();
    let out = minishell("echo one > a > b\necho two >> b\ncat < b", dir.path());
    assert_eq!(stdout(&out), "one\ntwo\n");
    assert_eq!(fs::read_to_string(dir.path().join("a")).unwrap(), "");
}

#[test]
fn missing_input_file_fails_its_stage_only() {
    let dir = tempfile::tempdir().unwrap();
    let out = minishell("cat < missing | echo still", dir.path());
    assert_eq!(out.status.code(), Some(0));
    assert_eq!(stdout(&out), "still\n");
    assert_eq!(stderr(&out), "minishell: missing: No such file or directory\n");
}

#[test]
fn syntax_errors() {
    let dir = tempfile::tempdir().unwrap();
    let out = minishell("echo \"a", dir.path());
    assert_eq!(out.status.code(), Some(2));
    assert_eq!(
        stderr(&out),
        "minishell: unexpected EOF while looking for matching `\"'\n"
    );

    let out = minishell("| ls", dir.path());
    assert_eq!(out.status.code(), Some(2));
    assert_eq!(stderr(&out), "minishell: syntax error near unexpected token `|'\n");
}

#[test]
fn quoting_and_splitting() {
    let dir = tempfile::tempdir().unwrap();
    let script = "export V='a   b'\nprintf '[%s]' $V \"$V\" '$V' x\"$V\"y\necho";
    let out = minishell(script, dir.path());
    assert_eq!(stdout(&out), "[a][b][a   b][$V][xa   by]\n");
}

#[test]
fn cd_changes_where_commands_run() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir(dir.path().join("sub")).unwrap();
    let out = minishell("cd sub\n/bin/pwd\necho made > file", dir.path());
    assert_eq!(out.status.code(), Some(0));
    assert!(stdout(&out).trim_end().ends_with("/sub"));
    assert!(dir.path().join("sub/file").exists());
}

#[test]
fn cd_to_a_missing_directory() {
    let dir = tempfile::tempdir().unwrap();
    let out = minishell("cd /nonexistent_dir_xyz\necho $?\npwd", dir.path());
    let canonical = fs::canonicalize(dir.path()).unwrap();
    assert_eq!(stdout(&out), format!("1\n{}\n", canonical.display()));
}

#[test]
fn cd_without_arguments_goes_home() {
    let dir = tempfile::tempdir().unwrap();
    let home = fs::canonicalize(dir.path()).unwrap();
    let out = Command::new(env!("CARGO_BIN_EXE_minishell"))
        .args(["-c", "cd\npwd"])
        .env("HOME", &home)
        .current_dir("/")
        .output()
        .unwrap();
    assert_eq!(stdout(&out), format!("{}\n", home.display()));
}

#[test]
fn builtins_in_a_pipeline_do_not_touch_the_shell() {
    let dir = tempfile::tempdir().unwrap();
    let out = minishell(
        "export PIPED_ONLY=1 | cat\necho \"[$PIPED_ONLY]\"\nexit 3 | echo after",
        dir.path(),
    );
    assert_eq!(out.status.code(), Some(0));
    assert_eq!(stdout(&out), "[]\nafter\n");
}

#[test]
fn exit_statuses() {
    let dir = tempfile::tempdir().unwrap();
    assert_eq!(minishell("exit 42\necho never", dir.path()).status.code(), Some(42));
    assert_eq!(minishell("exit 256", dir.path()).status.code(), Some(0));
    assert_eq!(minishell("false\nexit", dir.path()).status.code(), Some(1));

    let out = minishell("exit abc", dir.path());
    assert_eq!(out.status.code(), Some(2));
    assert_eq!(stderr(&out), "minishell: exit: abc: numeric argument required\n");

    let out = minishell("exit 1 2\necho still here", dir.path());
    assert_eq!(out.status.code(), Some(0));
    assert_eq!(stdout(&out), "still here\n");
}

#[test]
fn exported_variables_reach_children() {
    let dir = tempfile::tempdir().unwrap();
    let script = "export FROM_SHELL=yes\nprintenv FROM_SHELL\nunset FROM_SHELL\nprintenv FROM_SHELL";
    let out = minishell(script, dir.path());
    assert_eq!(stdout(&out), "yes\n");
    assert_eq!(out.status.code(), Some(1));
}

#[test]
fn commands_from_standard_input() {
    let dir = tempfile::tempdir().unwrap();
    let mut child = Command::new(env!("CARGO_BIN_EXE_minishell"))
        .current_dir(dir.path())
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .spawn()
        .unwrap();
    {
        use std::io::Write;
        let mut stdin = child.stdin.take().unwrap();
        stdin.write_all(b"echo piped\nexit 7\n").unwrap();
    }
    let out = child.wait_with_output().unwrap();
    assert_eq!(stdout(&out), "piped\n");
    assert_eq!(out.status.code(), Some(7));
}

fn minishell_with_input(input: &[u8], dir: &Path) -> Output {
    use std::io::Write;
    let mut child = Command::new(env!("CARGO_BIN_EXE_minishell"))
        .current_dir(dir)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();
    child.stdin.take().unwrap().write_all(input).unwrap();
    child.wait_with_output().unwrap()
}

#[test]
fn children_read_the_rest_of_standard_input() {
    let dir = tempfile::tempdir().unwrap();
    let out = minishell_with_input(b"cat\nhello\n", dir.path());
    assert_eq!(out.status.code(), Some(0));
    assert_eq!(stdout(&out), "hello\n");
    assert_eq!(stderr(&out), "");
}

#[test]
fn invalid_utf8_line_does_not_end_the_session() {
    let dir = tempfile::tempdir().unwrap();
    let out = minishell_with_input(b"echo \xff\necho after\n", dir.path());
    assert_eq!(out.status.code(), Some(0));
    assert_eq!(stdout(&out), "\u{fffd}\nafter\n");
}

#[test]
fn starts_with_a_non_utf8_environment_variable() {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;
    let dir = tempfile::tempdir().unwrap();
    let out = Command::new(env!("CARGO_BIN_EXE_minishell"))
        .args(["-c", "echo alive"])
        .env(OsStr::from_bytes(b"NOT_UTF8"), OsStr::from_bytes(b"\xff\xfe"))
        .current_dir(dir.path())
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(0));
    assert_eq!(stdout(&out), "alive\n");
}
