// The single HTML page: form on the left, result on the right, history below.
// All state lives on the server; the script only calls the JSON API.

use crate::ai::FieldName;
use crate::form::{LABEL_IDLE, LABEL_LOADING};

pub fn render_page() -> String {
    PAGE_HTML
        .replace("{{FIELDS}}", &render_inputs())
        .replace("{{FREE_TEXT_PLACEHOLDER}}", FieldName::FreeText.form_label())
        .replace("{{BUTTON_IDLE}}", LABEL_IDLE)
        .replace("{{BUTTON_LOADING}}", LABEL_LOADING)
}

fn render_inputs() -> String {
    FieldName::INPUT_FIELDS
        .iter()
        .map(|field| {
            format!(
                r#"<label for="field-{name}">{label}</label>
        <input type="text" id="field-{name}" data-field="{name}" />"#,
                name = field.wire_name(),
                label = field.form_label(),
            )
        })
        .collect::<Vec<_>>()
        .join("\n        ")
}

const PAGE_HTML: &str = r##"<!doctype html>
<html lang="ja">
<head>
  <meta charset="utf-8" />
  <meta name="viewport" content="width=device-width, initial-scale=1" />
  <title>LyricDeck</title>
  <style>
    body { margin: 0; font-family: "Hiragino Kaku Gothic ProN", "Yu Gothic UI", sans-serif; background: #dbeafe; }
    header { max-width: 64rem; margin: 0 auto; padding: 1rem 1.5rem; }
    header h1 { margin: 0; font-size: 1.5rem; color: #1e3a8a; }
    main { display: flex; max-width: 64rem; margin: 0 auto; height: 70vh; background: #fff; border-radius: 8px; overflow: hidden; }
    .form { width: 50%; background: #111827; color: #fff; padding: 1rem; display: flex; flex-direction: column; overflow-y: auto; }
    .form label { color: #86efac; margin-top: 0.75rem; }
    .form input, .form textarea { background: transparent; color: #fff; border: none; border-bottom: 1px solid #fff; padding: 0.5rem; }
    .form textarea { height: 6rem; resize: none; margin-top: 1rem; border: 1px solid #374151; }
    button { border: none; border-radius: 6px; padding: 0.5rem 1rem; color: #fff; cursor: pointer; }
    button:disabled { opacity: 0.5; cursor: not-allowed; }
    #submit { background: #4f46e5; margin-top: 0.5rem; }
    .result { width: 50%; padding: 1rem; overflow-y: auto; position: relative; }
    #copy { position: absolute; top: 1rem; right: 1rem; background: #16a34a; }
    #error { color: #b91c1c; }
    .logs { max-width: 64rem; margin: 1rem auto; background: #fff; border-radius: 8px; padding: 1rem; }
    .logs table { width: 100%; border-collapse: collapse; }
    .logs td, .logs th { border-bottom: 1px solid #e5e7eb; padding: 0.25rem 0.5rem; vertical-align: top; text-align: left; }
    .logs pre { white-space: pre-wrap; margin: 0; font-family: inherit; }
  </style>
</head>
<body>
  <header><h1>LyricDeck</h1></header>
  <main>
    <section class="form">
      <div>
        {{FIELDS}}
      </div>
      <textarea id="field-freeText" data-field="freeText" placeholder="{{FREE_TEXT_PLACEHOLDER}}"></textarea>
      <button id="submit">{{BUTTON_IDLE}}</button>
    </section>
    <section class="result">
      <div id="error"></div>
      <div id="output"></div>
      <button id="copy" hidden>結果をコピー</button>
    </section>
  </main>
  <section class="logs">
    <table>
      <thead><tr><th>日時</th><th>入力</th><th>出力</th><th></th></tr></thead>
      <tbody id="log-rows"></tbody>
    </table>
  </section>
  <script>
    const params = new URLSearchParams(location.search);
    if (params.get("token")) {
      sessionStorage.setItem("lyricdeck-token", params.get("token"));
      history.replaceState(null, "", location.pathname);
    }
    const token = sessionStorage.getItem("lyricdeck-token");

    async function api(path, options = {}) {
      const headers = { "Content-Type": "application/json" };
      if (token) headers["Authorization"] = "Bearer " + token;
      const res = await fetch(path, { ...options, headers });
      if (res.status === 401) throw new Error("アクセスできません。起動時に表示されたURLを開いてください。");
      const body = res.status === 204 ? null : await res.json().catch(() => null);
      if (!res.ok) throw new Error((body && body.error) || res.statusText);
      return body;
    }

    const inputs = document.querySelectorAll("[data-field]");
    const submitButton = document.getElementById("submit");
    const output = document.getElementById("output");
    const errorBox = document.getElementById("error");
    const copyButton = document.getElementById("copy");
    let currentMarkdown = "";
    const pending = {};
    let flushTimer = null;

    function queueUpdate(name, value) {
      pending[name] = value;
      clearTimeout(flushTimer);
      flushTimer = setTimeout(flushUpdates, 250);
    }

    async function flushUpdates() {
      const body = { ...pending };
      for (const key of Object.keys(pending)) delete pending[key];
      if (Object.keys(body).length) await api("/api/form", { method: "PUT", body: JSON.stringify(body) });
    }

    function showResult(state) {
      submitButton.disabled = state.isLoading;
      submitButton.textContent = state.buttonLabel;
      errorBox.textContent = state.error || "";
      if (state.isLoading) {
        output.textContent = state.buttonLabel;
        copyButton.hidden = true;
      } else if (state.result) {
        currentMarkdown = state.result.markdown;
        output.innerHTML = state.result.html;
        copyButton.hidden = !currentMarkdown;
      } else {
        output.textContent = "";
        copyButton.hidden = true;
      }
    }

    async function refreshLogs() {
      const page = await api("/api/logs?limit=50");
      const tbody = document.getElementById("log-rows");
      tbody.innerHTML = "";
      for (const row of page.rows) {
        const tr = document.createElement("tr");
        for (const text of [row.timestamp, row.input, row.output]) {
          const td = document.createElement("td");
          const pre = document.createElement("pre");
          pre.textContent = text;
          td.appendChild(pre);
          tr.appendChild(td);
        }
        const td = document.createElement("td");
        if (row.expanded || row.truncated) {
          const toggle = document.createElement("button");
          toggle.style.background = "#6b7280";
          toggle.textContent = row.expanded ? "閉じる" : "展開";
          toggle.onclick = async () => {
            await api("/api/logs/" + row.index + "/toggle", { method: "POST" });
            refreshLogs();
          };
          td.appendChild(toggle);
        }
        tr.appendChild(td);
        tbody.appendChild(tr);
      }
    }

    submitButton.onclick = async () => {
      submitButton.disabled = true;
      clearTimeout(flushTimer);
      let failure = null;
      try {
        await flushUpdates();
        showResult({ isLoading: true, buttonLabel: "{{BUTTON_LOADING}}", error: "" });
        await api("/api/submit", { method: "POST" });
      } catch (e) {
        failure = e.message;
      } finally {
        try {
          showResult(await api("/api/result"));
        } catch (e) {
          failure = failure || e.message;
          showResult({ isLoading: false, buttonLabel: "{{BUTTON_IDLE}}", error: "" });
        }
        if (failure) errorBox.textContent = failure;
        refreshLogs().catch(() => {});
      }
    };

    copyButton.onclick = () => {
      navigator.clipboard.writeText(currentMarkdown).then(() => {
        alert("結果がクリップボードにコピーされました！");
      });
    };

    (async () => {
      const fields = await api("/api/form");
      for (const input of inputs) {
        input.value = fields[input.dataset.field] || "";
        input.addEventListener("input", (e) => queueUpdate(input.dataset.field, e.target.value));
      }
      showResult(await api("/api/result"));
      refreshLogs();
    })().catch((e) => { errorBox.textContent = e.message; });
  </script>
</body>
</html>
"##;
